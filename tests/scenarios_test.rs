#[cfg(test)]
mod scenario_tests {
    use clap::Parser;
    use epicevents::cli::app::App;
    use epicevents::cli::prompt::ScriptedPrompter;
    use epicevents::cli::{Boundary, Cli, Commands, Outcome};
    use epicevents::core::shared::models::Amount;
    use epicevents::core::shared::test_utils::{
        seeded_connection, test_hasher, test_token_service, TEST_PASSWORD,
    };
    use epicevents::core::telemetry::{ErrorReporter, ReportContext};
    use epicevents::crm::query::QueryPlan;
    use epicevents::crm::{contracts, customers, events};
    use epicevents::security::session::{CredentialStore, FileCredentialStore};
    use epicevents::CrmError;
    use std::cell::RefCell;

    fn command(args: &[&str]) -> Commands {
        let argv = std::iter::once("epicevents").chain(args.iter().copied());
        Cli::try_parse_from(argv).expect("valid command line").command
    }

    fn app_with_store(store: Box<dyn CredentialStore>) -> App {
        App::new(seeded_connection(), test_token_service(), test_hasher(), store)
    }

    fn run(app: &mut App, args: &[&str], answers: &[&str]) -> Result<String, CrmError> {
        app.run(&command(args), &mut ScriptedPrompter::new(answers.iter().copied()))
    }

    #[derive(Default)]
    struct Collected(RefCell<Vec<String>>);

    impl ErrorReporter for Collected {
        fn report(&self, err: &CrmError, context: &ReportContext<'_>) {
            self.0.borrow_mut().push(format!(
                "{} {} {}",
                context.operation,
                context.actor.unwrap_or("-"),
                err.error_code()
            ));
        }
    }

    #[test]
    fn test_new_commercial_can_log_in() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = dir.path().join("session");
        let mut app = app_with_store(Box::new(FileCredentialStore::new(&session)));

        run(&mut app, &["login", "EMP0005"], &[TEST_PASSWORD]).expect("manager login");
        let out = run(
            &mut app,
            &[
                "employee", "create", "--first-name", "Gustave", "--last-name", "Eiffel",
                "--email", "gustave@epicevents.com", "--role-id", "1",
            ],
            &["tour-de-fer", "tour-de-fer"],
        )
        .expect("employee created");
        assert!(out.contains("EMP0007"));

        assert!(matches!(
            run(&mut app, &["login", "EMP0007"], &["wrong-password"]),
            Err(CrmError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            run(&mut app, &["login", "EMP0099"], &["tour-de-fer"]),
            Err(CrmError::AuthenticationFailed(_))
        ));
        assert_eq!(app.current_identity().as_deref(), Some("EMP0005"));

        run(&mut app, &["login", "EMP0007"], &["tour-de-fer"]).expect("new employee login");
        assert_eq!(app.current_identity().as_deref(), Some("EMP0007"));
        let stored = std::fs::read_to_string(&session).expect("session file");
        assert_eq!(
            app.tokens().verify(&stored).expect("valid").role_id,
            1
        );
    }

    #[test]
    fn test_customer_update_restricted_to_owner_and_management() {
        let mut app = app_with_store(Box::new(
            epicevents::security::session::MemoryCredentialStore::new(),
        ));
        let update = ["customer", "update", "1", "phone=0699887766"];

        run(&mut app, &["login", "EMP0002"], &[TEST_PASSWORD]).expect("login");
        assert!(matches!(run(&mut app, &update, &[]), Err(CrmError::Unauthorized(_))));

        run(&mut app, &["login", "EMP0001"], &[TEST_PASSWORD]).expect("login");
        assert!(run(&mut app, &update, &[]).expect("owner").contains("0699887766"));

        run(&mut app, &["login", "EMP0006"], &[TEST_PASSWORD]).expect("login");
        run(&mut app, &["customer", "update", "1", "company=Lambert SAS"], &[]).expect("manager");
        let customer = customers::find_customer(app.conn(), 1).expect("customer");
        assert_eq!(customer.company.as_deref(), Some("Lambert SAS"));
        assert_eq!(customer.phone.as_deref(), Some("0699887766"));
    }

    #[test]
    fn test_contract_with_event_cannot_be_unsigned() {
        let mut app = app_with_store(Box::new(
            epicevents::security::session::MemoryCredentialStore::new(),
        ));
        run(&mut app, &["login", "EMP0001"], &[TEST_PASSWORD]).expect("login");

        let contract = contracts::find_contract(app.conn(), 1).expect("contract");
        assert_eq!(contract.total_amount, Amount::from(1000));
        assert_eq!(contract.remaining_amount, Amount::from(500));
        assert!(contract.signed);

        assert!(matches!(
            run(&mut app, &["contract", "update", "1", "signed=non"], &[]),
            Err(CrmError::InvalidValue { .. })
        ));
        assert!(contracts::find_contract(app.conn(), 1).expect("contract").signed);
    }

    #[test]
    fn test_event_on_unsigned_contract_names_it() {
        let mut app = app_with_store(Box::new(
            epicevents::security::session::MemoryCredentialStore::new(),
        ));
        run(&mut app, &["login", "EMP0002"], &[TEST_PASSWORD]).expect("login");
        let err = run(
            &mut app,
            &[
                "event", "create", "--contract-id", "4", "--name", "Lancement",
                "--start-date", "2025-03-01 10:00", "--end-date", "2025-03-01 12:00",
            ],
            &[],
        )
        .expect_err("unsigned");
        assert!(err.to_string().contains("contract 4"), "{err}");

        run(&mut app, &["contract", "update", "4", "signed=oui"], &[]).expect("signed");
        run(
            &mut app,
            &[
                "event", "create", "--contract-id", "4", "--name", "Lancement",
                "--start-date", "2025-03-01 10:00", "--end-date", "2025-03-01 12:00",
            ],
            &[],
        )
        .expect("event created once signed");
    }

    #[test]
    fn test_deletions_null_contacts_and_cascade() {
        let mut app = app_with_store(Box::new(
            epicevents::security::session::MemoryCredentialStore::new(),
        ));
        run(&mut app, &["login", "EMP0005"], &[TEST_PASSWORD]).expect("login");

        run(&mut app, &["employee", "delete", "EMP0001", "--yes"], &[]).expect("employee deleted");
        let customer = customers::find_customer(app.conn(), 1).expect("customer kept");
        assert_eq!(customer.sale_contact_id, None);
        assert_eq!(
            contracts::find_contract(app.conn(), 1).expect("contract kept").sale_contact_id,
            None
        );

        run(&mut app, &["customer", "delete", "1"], &["oui"]).expect("customer deleted");
        let remaining = contracts::list_contracts(app.conn(), &QueryPlan::default())
            .expect("contracts");
        assert!(remaining.iter().all(|c| c.customer_id != 1));
        assert_eq!(remaining.len(), 3);
        let events = events::list_events(app.conn(), &QueryPlan::default()).expect("events");
        assert_eq!(events.iter().map(|e| e.contract_id).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_boundary_reports_only_unexpected_faults() {
        let mut app = app_with_store(Box::new(
            epicevents::security::session::MemoryCredentialStore::new(),
        ));
        let reporter = Collected::default();
        let arguments = vec!["customer".to_string(), "list".to_string()];
        let boundary = Boundary {
            reporter: &reporter,
            arguments: &arguments,
        };
        let (mut out, mut err) = (Vec::new(), Vec::new());

        let outcome = boundary.execute(
            &mut app,
            &command(&["customer", "list"]),
            &mut ScriptedPrompter::default(),
            &mut out,
            &mut err,
        );
        assert_eq!(outcome, Outcome::Failed);
        assert!(String::from_utf8(err.clone()).expect("utf8").contains("log in"));
        assert!(reporter.0.borrow().is_empty());

        let outcome = boundary.execute(
            &mut app,
            &command(&["login", "EMP0001"]),
            &mut ScriptedPrompter::new([TEST_PASSWORD]),
            &mut out,
            &mut err,
        );
        assert_eq!(outcome, Outcome::Succeeded);

        diesel::RunQueryDsl::execute(diesel::sql_query("DROP TABLE events"), app.conn())
            .expect("drop");
        let outcome = boundary.execute(
            &mut app,
            &command(&["event", "list"]),
            &mut ScriptedPrompter::default(),
            &mut out,
            &mut err,
        );
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(
            reporter.0.borrow().as_slice(),
            ["event list EMP0001 database_error"]
        );
    }
}
