diesel::table! {
    roles (id) {
        id -> Integer,
        name -> Text,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    employees (id) {
        id -> Integer,
        employee_number -> Text,
        first_name -> Text,
        last_name -> Text,
        email -> Text,
        password -> Text,
        role_id -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    customers (id) {
        id -> Integer,
        first_name -> Text,
        last_name -> Text,
        email -> Text,
        phone -> Nullable<Text>,
        company -> Nullable<Text>,
        sale_contact_id -> Nullable<Integer>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    contracts (id) {
        id -> Integer,
        customer_id -> Integer,
        sale_contact_id -> Nullable<Integer>,
        total_amount -> Text,
        remaining_amount -> Text,
        signed -> Bool,
        created_at -> Timestamp,
    }
}

diesel::table! {
    events (id) {
        id -> Integer,
        name -> Text,
        contract_id -> Integer,
        support_contact_id -> Nullable<Integer>,
        start_date -> Nullable<Timestamp>,
        end_date -> Nullable<Timestamp>,
        location -> Nullable<Text>,
        attendees -> Nullable<Integer>,
        notes -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::joinable!(employees -> roles (role_id));
diesel::joinable!(contracts -> customers (customer_id));
diesel::joinable!(events -> contracts (contract_id));

diesel::allow_tables_to_appear_in_same_query!(roles, employees, customers, contracts, events);
