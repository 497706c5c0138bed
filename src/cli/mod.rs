//! Command-line surface: argument parsing, the access requirement of each
//! command and the boundary that turns results into output.

pub mod app;
pub mod prompt;
pub mod render;

use crate::core::error::CrmError;
use crate::core::telemetry::{ErrorReporter, ReportContext};
use crate::crm::query::{parse_assignment, parse_sort, SortDirection};
use crate::security::rbac::AccessRequirement;
use app::App;
use clap::{Args, Parser, Subcommand};
use prompt::Prompter;
use std::io::Write;
use tracing::debug;

/// Epic Events CRM: employees, customers, contracts and events.
#[derive(Parser, Debug)]
#[command(name = "epicevents", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Log in with an employee number; the password is prompted.
    Login { employee_number: String },

    /// Change your own password.
    ChangePassword,

    /// Reference roles.
    #[command(subcommand)]
    Role(RoleCommand),

    /// Manage employees (Management only, except listing).
    #[command(subcommand)]
    Employee(EmployeeCommand),

    /// Manage customers.
    #[command(subcommand)]
    Customer(CustomerCommand),

    /// Manage contracts.
    #[command(subcommand)]
    Contract(ContractCommand),

    /// Manage events.
    #[command(subcommand)]
    Event(EventCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum RoleCommand {
    List,
}

/// Repeatable filter and sort criteria shared by every `list` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// attribute=value; `none` matches empty fields, `true`/`false` booleans,
    /// anything else is a case-insensitive substring match.
    #[arg(short = 'f', long = "filter", value_parser = parse_assignment)]
    pub filters: Vec<(String, String)>,

    /// attribute=asc|desc, applied in the order given.
    #[arg(short = 's', long = "sort", value_parser = parse_sort)]
    pub sorts: Vec<(String, SortDirection)>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// attribute=value pairs.
    #[arg(required = true, value_parser = parse_assignment)]
    pub updates: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EmployeeCreateArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    /// 1 Commercial, 2 Support, 3 Management.
    #[arg(long)]
    pub role_id: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EmployeeCommand {
    Create(EmployeeCreateArgs),
    List(ListArgs),
    /// Update an employee given by number (EMP0001) or id.
    Update {
        employee: String,
        #[command(flatten)]
        args: UpdateArgs,
    },
    /// Set another employee's password.
    UpdatePassword { employee: String },
    Delete {
        employee: String,
        /// Skip the confirmation question.
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct CustomerCreateArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CustomerCommand {
    Create(CustomerCreateArgs),
    List(ListArgs),
    Update {
        id: i32,
        #[command(flatten)]
        args: UpdateArgs,
    },
    /// Assign a new sales contact; the customer's contracts follow.
    UpdateContact { id: i32, employee: String },
    Delete {
        id: i32,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ContractCreateArgs {
    #[arg(long)]
    pub customer_id: Option<String>,
    #[arg(long)]
    pub total_amount: Option<String>,
    /// Defaults to the total amount.
    #[arg(long)]
    pub remaining_amount: Option<String>,
    /// oui/non; defaults to non.
    #[arg(long)]
    pub signed: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ContractCommand {
    Create(ContractCreateArgs),
    List(ListArgs),
    Update {
        id: i32,
        #[command(flatten)]
        args: UpdateArgs,
    },
    Delete {
        id: i32,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct EventCreateArgs {
    #[arg(long)]
    pub contract_id: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    /// YYYY-MM-DD HH:MM
    #[arg(long)]
    pub start_date: Option<String>,
    /// YYYY-MM-DD HH:MM
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub attendees: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EventCommand {
    Create(EventCreateArgs),
    List(ListArgs),
    Update {
        id: i32,
        #[command(flatten)]
        args: UpdateArgs,
    },
    /// Assign a support contact.
    UpdateContact { id: i32, employee: String },
    Delete {
        id: i32,
        #[arg(short, long)]
        yes: bool,
    },
}

impl Commands {
    /// Guard applied before the command touches any input or data.
    /// `None` only for `login`.
    pub fn requirement(&self) -> Option<AccessRequirement> {
        use AccessRequirement::*;
        let requirement = match self {
            Self::Login { .. } => return None,
            Self::ChangePassword | Self::Role(_) => Authenticated,
            Self::Employee(EmployeeCommand::List(_))
            | Self::Customer(CustomerCommand::List(_))
            | Self::Contract(ContractCommand::List(_))
            | Self::Event(EventCommand::List(_)) => Authenticated,
            Self::Employee(_) => ManagerOnly,
            Self::Customer(CustomerCommand::Create(_) | CustomerCommand::Update { .. }) => {
                SalesOrManager
            }
            Self::Customer(_) => ManagerOnly,
            Self::Contract(ContractCommand::Update { .. }) => SalesOrManager,
            Self::Contract(_) => ManagerOnly,
            Self::Event(EventCommand::Create(_)) => SalesOrManager,
            Self::Event(EventCommand::Update { .. }) => SupportOrManager,
            Self::Event(_) => ManagerOnly,
        };
        Some(requirement)
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::ChangePassword => "change-password",
            Self::Role(RoleCommand::List) => "role list",
            Self::Employee(c) => match c {
                EmployeeCommand::Create(_) => "employee create",
                EmployeeCommand::List(_) => "employee list",
                EmployeeCommand::Update { .. } => "employee update",
                EmployeeCommand::UpdatePassword { .. } => "employee update-password",
                EmployeeCommand::Delete { .. } => "employee delete",
            },
            Self::Customer(c) => match c {
                CustomerCommand::Create(_) => "customer create",
                CustomerCommand::List(_) => "customer list",
                CustomerCommand::Update { .. } => "customer update",
                CustomerCommand::UpdateContact { .. } => "customer update-contact",
                CustomerCommand::Delete { .. } => "customer delete",
            },
            Self::Contract(c) => match c {
                ContractCommand::Create(_) => "contract create",
                ContractCommand::List(_) => "contract list",
                ContractCommand::Update { .. } => "contract update",
                ContractCommand::Delete { .. } => "contract delete",
            },
            Self::Event(c) => match c {
                EventCommand::Create(_) => "event create",
                EventCommand::List(_) => "event list",
                EventCommand::Update { .. } => "event update",
                EventCommand::UpdateContact { .. } => "event update-contact",
                EventCommand::Delete { .. } => "event delete",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl Outcome {
    /// Handled failures only change the exit status in strict mode.
    pub fn exit_status(self, strict: bool) -> u8 {
        match self {
            Self::Failed if strict => 1,
            _ => 0,
        }
    }
}

/// Where every command ends up: output on success, a message on failure,
/// unexpected faults forwarded to the reporter.
pub struct Boundary<'a> {
    pub reporter: &'a dyn ErrorReporter,
    pub arguments: &'a [String],
}

impl Boundary<'_> {
    pub fn execute(
        &self,
        app: &mut App,
        command: &Commands,
        prompter: &mut dyn Prompter,
        out: &mut dyn Write,
        err_out: &mut dyn Write,
    ) -> Outcome {
        let operation = command.operation();
        debug!(operation, "running command");
        match app.run(command, prompter) {
            Ok(output) => {
                let _ = write!(out, "{output}");
                Outcome::Succeeded
            }
            Err(err) => {
                let _ = writeln!(err_out, "Error: {err}");
                self.forward(app, operation, &err);
                Outcome::Failed
            }
        }
    }

    fn forward(&self, app: &App, operation: &str, err: &CrmError) {
        if err.is_expected() {
            return;
        }
        let actor = app.current_identity();
        self.reporter.report(
            err,
            &ReportContext {
                operation,
                actor: actor.as_deref(),
                arguments: self.arguments,
            },
        );
    }
}
