use super::prompt::Prompter;
use super::render::{render_one, render_table, ListContext};
use super::{
    Commands, ContractCommand, ContractCreateArgs, CustomerCommand, CustomerCreateArgs,
    EmployeeCommand, EmployeeCreateArgs, EventCommand, ListArgs, RoleCommand,
};
use crate::core::config::AppConfig;
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::utils::{establish_connection, DbConn};
use crate::crm::contracts::{self, ContractDraft};
use crate::crm::customers::{self, CustomerDraft};
use crate::crm::employees::{self, EmployeeDraft};
use crate::crm::events::{self, EventDraft};
use crate::crm::fields::{EntitySchema, CONTRACT, CUSTOMER, EMPLOYEE, EVENT};
use crate::crm::query::{build_plan, dedupe_last_wins, QueryPlan};
use crate::crm::{auth, roles};
use crate::security::jwt::TokenService;
use crate::security::password::SecretHasher;
use crate::security::rbac::{AccessGuard, AccessRequirement, Actor};
use crate::security::session::{CredentialStore, FileCredentialStore};
use tracing::debug;

/// Everything a command needs: the store, the token service, the password
/// hasher and where the session credential lives.
pub struct App {
    conn: DbConn,
    tokens: TokenService,
    hasher: SecretHasher,
    credentials: Box<dyn CredentialStore>,
}

impl App {
    pub fn new(
        conn: DbConn,
        tokens: TokenService,
        hasher: SecretHasher,
        credentials: Box<dyn CredentialStore>,
    ) -> Self {
        Self {
            conn,
            tokens,
            hasher,
            credentials,
        }
    }

    pub fn from_config(config: &AppConfig) -> CrmResult<Self> {
        let tokens = TokenService::new(config.token_config(), config.jwt_secret()?)?;
        let conn = establish_connection(&config.database_url)?;
        Ok(Self::new(
            conn,
            tokens,
            SecretHasher::with_defaults()?,
            Box::new(FileCredentialStore::new(&config.session_file)),
        ))
    }

    pub fn conn(&mut self) -> &mut DbConn {
        &mut self.conn
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Runs the guard, then resolves the credential's subject to a live
    /// employee row.
    pub fn authorize(&mut self, requirement: AccessRequirement) -> CrmResult<Actor> {
        let principal =
            AccessGuard::new(self.credentials.as_ref(), &self.tokens).check(requirement)?;
        let employee = employees::find_by_number(&mut self.conn, &principal.employee_number)
            .map_err(|e| match e {
                CrmError::NotFound(_) => CrmError::InvalidCredential(format!(
                    "employee {} no longer exists",
                    principal.employee_number
                )),
                other => other,
            })?;
        Ok(Actor {
            id: employee.id,
            employee_number: employee.employee_number,
            department: principal.department,
        })
    }

    /// Employee number of a valid stored credential, if any.
    pub fn current_identity(&self) -> Option<String> {
        let credential = self.credentials.load().ok()??;
        self.tokens
            .verify(&credential)
            .ok()
            .map(|identity| identity.employee_number)
    }

    pub fn run(&mut self, command: &Commands, prompter: &mut dyn Prompter) -> CrmResult<String> {
        let actor = match command.requirement() {
            Some(requirement) => Some(self.authorize(requirement)?),
            None => None,
        };
        if let Some(actor) = &actor {
            debug!(employee = %actor.employee_number, operation = command.operation(), "authorized");
        }
        match (command, actor) {
            (Commands::Login { employee_number }, _) => self.login(employee_number, prompter),
            (_, None) => Err(CrmError::NotAuthenticated),
            (Commands::ChangePassword, Some(actor)) => self.change_password(&actor, prompter),
            (Commands::Role(RoleCommand::List), Some(_)) => {
                Ok(render_table(&roles::list_roles(&mut self.conn)?, ListContext::List))
            }
            (Commands::Employee(c), Some(_)) => self.employee(c, prompter),
            (Commands::Customer(c), Some(actor)) => self.customer(c, &actor, prompter),
            (Commands::Contract(c), Some(actor)) => self.contract(c, &actor, prompter),
            (Commands::Event(c), Some(actor)) => self.event(c, &actor, prompter),
        }
    }

    fn login(&mut self, employee_number: &str, prompter: &mut dyn Prompter) -> CrmResult<String> {
        let password = prompter.ask_secret("Password")?;
        let employee = auth::login(
            &mut self.conn,
            &self.hasher,
            &self.tokens,
            self.credentials.as_ref(),
            employee_number.trim(),
            &password,
        )?;
        Ok(format!(
            "Welcome {} ({}), session valid for {} minutes.\n",
            employee.full_name(),
            employee.employee_number,
            self.tokens.config().ttl_minutes
        ))
    }

    fn change_password(&mut self, actor: &Actor, prompter: &mut dyn Prompter) -> CrmResult<String> {
        let current = prompter.ask_secret("Current password")?;
        let new_password = new_password(prompter)?;
        auth::change_password(&mut self.conn, &self.hasher, actor, &current, &new_password)?;
        Ok("Password changed.\n".to_string())
    }

    fn employee(&mut self, command: &EmployeeCommand, prompter: &mut dyn Prompter) -> CrmResult<String> {
        let conn = &mut self.conn;
        match command {
            EmployeeCommand::Create(args) => {
                let draft = employee_draft(args, prompter)?;
                let employee = employees::create_employee(conn, &self.hasher, &draft)?;
                Ok(render_one(&employee, ListContext::Create))
            }
            EmployeeCommand::List(args) => {
                let plan = plan(&EMPLOYEE, args)?;
                Ok(render_table(&employees::list_employees(conn, &plan)?, ListContext::List))
            }
            EmployeeCommand::Update { employee, args } => {
                let updates = dedupe_last_wins(args.updates.clone());
                let employee = employees::update_employee(conn, employee, &updates)?;
                Ok(render_one(&employee, ListContext::Update))
            }
            EmployeeCommand::UpdatePassword { employee } => {
                let target = employees::find_employee(conn, employee)?;
                let password = new_password(prompter)?;
                employees::set_password(conn, &self.hasher, &target.employee_number, &password)?;
                Ok(format!("Password of {} updated.\n", target.employee_number))
            }
            EmployeeCommand::Delete { employee, yes } => {
                let target = employees::find_employee(conn, employee)?;
                if !confirmed(
                    prompter,
                    *yes,
                    &format!("Delete employee {} ({})?", target.employee_number, target.full_name()),
                )? {
                    return Ok(cancelled());
                }
                let deleted = employees::delete_employee(conn, &target.employee_number)?;
                Ok(render_one(&deleted, ListContext::Delete))
            }
        }
    }

    fn customer(
        &mut self,
        command: &CustomerCommand,
        actor: &Actor,
        prompter: &mut dyn Prompter,
    ) -> CrmResult<String> {
        let conn = &mut self.conn;
        match command {
            CustomerCommand::Create(args) => {
                let draft = customer_draft(args, prompter)?;
                let customer = customers::create_customer(conn, actor, &draft)?;
                Ok(render_one(&customer, ListContext::Create))
            }
            CustomerCommand::List(args) => {
                let plan = plan(&CUSTOMER, args)?;
                Ok(render_table(&customers::list_customers(conn, &plan)?, ListContext::List))
            }
            CustomerCommand::Update { id, args } => {
                let updates = dedupe_last_wins(args.updates.clone());
                let customer = customers::update_customer(conn, actor, *id, &updates)?;
                Ok(render_one(&customer, ListContext::Update))
            }
            CustomerCommand::UpdateContact { id, employee } => {
                let (customer, touched) =
                    customers::update_customer_sale_contact(conn, *id, employee)?;
                let mut out = render_one(&customer, ListContext::Update);
                out.push_str(&format!("{touched} contract(s) reassigned.\n"));
                Ok(out)
            }
            CustomerCommand::Delete { id, yes } => {
                let target = customers::find_customer(conn, *id)?;
                if !confirmed(
                    prompter,
                    *yes,
                    &format!(
                        "Delete customer {} {} and all of their contracts?",
                        target.first_name, target.last_name
                    ),
                )? {
                    return Ok(cancelled());
                }
                let deleted = customers::delete_customer(conn, *id)?;
                Ok(render_one(&deleted, ListContext::Delete))
            }
        }
    }

    fn contract(
        &mut self,
        command: &ContractCommand,
        actor: &Actor,
        prompter: &mut dyn Prompter,
    ) -> CrmResult<String> {
        let conn = &mut self.conn;
        match command {
            ContractCommand::Create(args) => {
                let draft = contract_draft(args, prompter)?;
                let contract = contracts::create_contract(conn, &draft)?;
                Ok(render_one(&contract, ListContext::Create))
            }
            ContractCommand::List(args) => {
                let plan = plan(&CONTRACT, args)?;
                Ok(render_table(&contracts::list_contracts(conn, &plan)?, ListContext::List))
            }
            ContractCommand::Update { id, args } => {
                let updates = dedupe_last_wins(args.updates.clone());
                let contract = contracts::update_contract(conn, actor, *id, &updates)?;
                Ok(render_one(&contract, ListContext::Update))
            }
            ContractCommand::Delete { id, yes } => {
                contracts::find_contract(conn, *id)?;
                if !confirmed(prompter, *yes, &format!("Delete contract {id} and its event?"))? {
                    return Ok(cancelled());
                }
                let deleted = contracts::delete_contract(conn, *id)?;
                Ok(render_one(&deleted, ListContext::Delete))
            }
        }
    }

    fn event(
        &mut self,
        command: &EventCommand,
        actor: &Actor,
        prompter: &mut dyn Prompter,
    ) -> CrmResult<String> {
        let conn = &mut self.conn;
        match command {
            EventCommand::Create(args) => {
                let contract_id = parse_id(
                    &required(prompter, &args.contract_id, "Contract id")?,
                    "contract_id",
                )?;
                // Refuse before asking for the rest of the event.
                events::check_event_eligibility(conn, actor, contract_id)?;
                let draft = EventDraft {
                    contract_id,
                    name: required(prompter, &args.name, "Event name")?,
                    start_date: required(prompter, &args.start_date, "Start date (YYYY-MM-DD HH:MM)")?,
                    end_date: required(prompter, &args.end_date, "End date (YYYY-MM-DD HH:MM)")?,
                    location: args.location.clone(),
                    attendees: args.attendees.clone(),
                    notes: args.notes.clone(),
                };
                let event = events::create_event(conn, actor, &draft)?;
                Ok(render_one(&event, ListContext::Create))
            }
            EventCommand::List(args) => {
                let plan = plan(&EVENT, args)?;
                Ok(render_table(&events::list_events(conn, &plan)?, ListContext::List))
            }
            EventCommand::Update { id, args } => {
                let updates = dedupe_last_wins(args.updates.clone());
                let event = events::update_event(conn, actor, *id, &updates)?;
                Ok(render_one(&event, ListContext::Update))
            }
            EventCommand::UpdateContact { id, employee } => {
                let event = events::update_event_support_contact(conn, *id, employee)?;
                Ok(render_one(&event, ListContext::Update))
            }
            EventCommand::Delete { id, yes } => {
                let target = events::find_event(conn, *id)?;
                if !confirmed(prompter, *yes, &format!("Delete event {id} ({})?", target.name))? {
                    return Ok(cancelled());
                }
                let deleted = events::delete_event(conn, *id)?;
                Ok(render_one(&deleted, ListContext::Delete))
            }
        }
    }
}

fn plan(schema: &'static EntitySchema, args: &ListArgs) -> CrmResult<QueryPlan> {
    build_plan(
        schema,
        &dedupe_last_wins(args.filters.clone()),
        &dedupe_last_wins(args.sorts.clone()),
    )
}

/// The flag value when given, otherwise the prompted answer.
fn required(prompter: &mut dyn Prompter, given: &Option<String>, label: &str) -> CrmResult<String> {
    match given {
        Some(value) => Ok(value.clone()),
        None => prompter.ask(label),
    }
}

fn parse_id(raw: &str, field: &str) -> CrmResult<i32> {
    raw.trim()
        .parse()
        .map_err(|_| CrmError::invalid(field, format!("'{raw}' is not a valid id")))
}

fn new_password(prompter: &mut dyn Prompter) -> CrmResult<String> {
    let password = prompter.ask_secret("New password")?;
    let repeated = prompter.ask_secret("Repeat new password")?;
    if password != repeated {
        return Err(CrmError::invalid("password", "the two passwords do not match"));
    }
    Ok(password)
}

fn confirmed(prompter: &mut dyn Prompter, skip: bool, question: &str) -> CrmResult<bool> {
    if skip {
        return Ok(true);
    }
    prompter.confirm(question)
}

fn cancelled() -> String {
    "Deletion cancelled.\n".to_string()
}

fn employee_draft(args: &EmployeeCreateArgs, prompter: &mut dyn Prompter) -> CrmResult<EmployeeDraft> {
    Ok(EmployeeDraft {
        first_name: required(prompter, &args.first_name, "First name")?,
        last_name: required(prompter, &args.last_name, "Last name")?,
        email: required(prompter, &args.email, "Email")?,
        role_id: required(
            prompter,
            &args.role_id,
            "Role (1 Commercial, 2 Support, 3 Management)",
        )?,
        password: new_password(prompter)?,
    })
}

fn customer_draft(args: &CustomerCreateArgs, prompter: &mut dyn Prompter) -> CrmResult<CustomerDraft> {
    Ok(CustomerDraft {
        first_name: required(prompter, &args.first_name, "First name")?,
        last_name: required(prompter, &args.last_name, "Last name")?,
        email: required(prompter, &args.email, "Email")?,
        phone: args.phone.clone(),
        company: args.company.clone(),
    })
}

fn contract_draft(args: &ContractCreateArgs, prompter: &mut dyn Prompter) -> CrmResult<ContractDraft> {
    Ok(ContractDraft {
        customer_id: parse_id(
            &required(prompter, &args.customer_id, "Customer id")?,
            "customer_id",
        )?,
        total_amount: required(prompter, &args.total_amount, "Total amount")?,
        remaining_amount: args.remaining_amount.clone(),
        signed: args.signed.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::prompt::ScriptedPrompter;
    use crate::cli::Cli;
    use crate::core::shared::test_utils::{
        seeded_connection, test_hasher, test_token_service, TEST_PASSWORD,
    };
    use crate::security::session::MemoryCredentialStore;
    use clap::Parser;

    fn app() -> App {
        App::new(
            seeded_connection(),
            test_token_service(),
            test_hasher(),
            Box::new(MemoryCredentialStore::new()),
        )
    }

    fn command(args: &[&str]) -> Commands {
        let argv = std::iter::once("epicevents").chain(args.iter().copied());
        Cli::try_parse_from(argv).expect("valid command line").command
    }

    fn login(app: &mut App, number: &str) {
        app.run(
            &command(&["login", number]),
            &mut ScriptedPrompter::new([TEST_PASSWORD]),
        )
        .expect("login");
    }

    #[test]
    fn test_login_then_identity() {
        let mut app = app();
        assert_eq!(app.current_identity(), None);
        login(&mut app, "EMP0003");
        assert_eq!(app.current_identity().as_deref(), Some("EMP0003"));
    }

    #[test]
    fn test_guard_runs_before_prompts() {
        let mut app = app();
        login(&mut app, "EMP0003");
        let mut prompter = ScriptedPrompter::new(["Hugo"]);
        let result = app.run(&command(&["customer", "create"]), &mut prompter);

        assert!(matches!(result, Err(CrmError::Unauthorized(_))));
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_create_prompts_for_missing_fields() {
        let mut app = app();
        login(&mut app, "EMP0002");
        let mut prompter = ScriptedPrompter::new(["Lefevre", "hugo@lefevre.fr"]);
        let out = app
            .run(
                &command(&["customer", "create", "--first-name", "Hugo"]),
                &mut prompter,
            )
            .expect("created");

        assert_eq!(prompter.asked, vec!["Last name", "Email"]);
        assert!(out.starts_with("Customer created\n"));
        assert!(out.contains("hugo@lefevre.fr"));
    }

    #[test]
    fn test_event_create_checks_contract_before_prompting() {
        let mut app = app();
        login(&mut app, "EMP0002");
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let result = app.run(
            &command(&["event", "create", "--contract-id", "4"]),
            &mut prompter,
        );

        match result {
            Err(CrmError::InvalidValue { message, .. }) => assert!(message.contains("contract 4")),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_delete_can_be_cancelled() {
        let mut app = app();
        login(&mut app, "EMP0005");
        let out = app
            .run(&command(&["event", "delete", "1"]), &mut ScriptedPrompter::new(["non"]))
            .expect("cancelled");
        assert_eq!(out, "Deletion cancelled.\n");
        assert!(events::find_event(app.conn(), 1).is_ok());

        app.run(&command(&["event", "delete", "1", "--yes"]), &mut ScriptedPrompter::default())
            .expect("deleted");
        assert!(matches!(events::find_event(app.conn(), 1), Err(CrmError::NotFound(_))));
    }

    #[test]
    fn test_new_password_must_be_repeated() {
        let mut app = app();
        login(&mut app, "EMP0005");
        let result = app.run(
            &command(&["employee", "update-password", "EMP0001"]),
            &mut ScriptedPrompter::new(["nouveau-secret", "nouveau-secrex"]),
        );
        assert!(matches!(result, Err(CrmError::InvalidValue { .. })));
    }

    #[test]
    fn test_credential_for_deleted_employee_is_rejected() {
        let mut app = app();
        login(&mut app, "EMP0006");
        employees::delete_employee(app.conn(), "EMP0006").expect("deleted");
        assert!(matches!(
            app.run(&command(&["role", "list"]), &mut ScriptedPrompter::default()),
            Err(CrmError::InvalidCredential(_))
        ));
    }
}
