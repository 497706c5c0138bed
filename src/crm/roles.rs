use crate::core::error::CrmResult;
use crate::core::shared::models::Role;
use crate::core::shared::schema::roles;
use crate::core::shared::utils::DbConn;
use diesel::prelude::*;

pub fn list_roles(conn: &mut DbConn) -> CrmResult<Vec<Role>> {
    Ok(roles::table
        .select(Role::as_select())
        .order(roles::id.asc())
        .load(conn)?)
}
