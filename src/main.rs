//! `pollctl`: browse polls, vote, and inspect results from the command line.

use std::fs;
use std::io::{self, BufRead, Write};

use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{error, info, LevelFilter};
use thiserror::Error;

use poll_client::api::{browse_polls, AuthContext, HttpPollService, PollService};
use poll_client::engine::{self, compute_result_view};
use poll_client::model::{
    deadline,
    pagination::{Pagination, PaginationError, DEFAULT_PAGE_SIZE},
    poll::{NewPoll, Poll, PollSpecError, SelectionMode, StatusFilter},
    user::{Credentials, ProfileUpdate, Registration, Role, User},
};
use poll_client::session::{SessionError, VotingSession};
use poll_client::Config;

const PROGRAM_NAME: &str = "pollctl";

const ABOUT_TEXT: &str = "Browse polls, vote, and view results.

EXIT CODES:
     0: Success.
     1: Error, including refusals from the service.
     2: Refused locally; nothing was sent.";

const API: &str = "API";
const POLL_ID: &str = "POLL_ID";
const VARIANTS: &str = "VARIANTS";
const YES: &str = "YES";
const STATUS: &str = "STATUS";
const PAGE: &str = "PAGE";
const PAGE_SIZE: &str = "PAGE_SIZE";
const CSV: &str = "CSV";
const TITLE: &str = "TITLE";
const DESCRIPTION: &str = "DESCRIPTION";
const OPTION: &str = "OPTION";
const MULTI: &str = "MULTI";
const DEADLINE: &str = "DEADLINE";
const PUBLIC: &str = "PUBLIC";
const USERNAME: &str = "USERNAME";
const PASSWORD: &str = "PASSWORD";
const EMAIL: &str = "EMAIL";
const NAME: &str = "NAME";
const ADMIN: &str = "ADMIN";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let poll_id = Arg::new(POLL_ID)
        .help("ID of the poll")
        .action(ArgAction::Set)
        .required(true);

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(API)
                .long("api")
                .help("Base URL of the poll service; overrides the configuration")
                .action(ArgAction::Set)
                .global(true),
        )
        .subcommand(
            Command::new("polls")
                .about("List polls")
                .arg(
                    Arg::new(STATUS)
                        .long("status")
                        .help("Only show polls with this status: all, active or completed")
                        .value_parser(|s: &str| s.parse::<StatusFilter>())
                        .default_value("all"),
                )
                .arg(
                    Arg::new(PAGE)
                        .long("page")
                        .value_parser(value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    Arg::new(PAGE_SIZE)
                        .long("page-size")
                        .help("Polls per page [default: 50]")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show a poll and its variants")
                .arg(poll_id.clone()),
        )
        .subcommand(
            Command::new("vote")
                .about("Select variants, in order, and cast a vote")
                .arg(poll_id.clone())
                .arg(
                    Arg::new(VARIANTS)
                        .help("Variant IDs or labels to toggle")
                        .action(ArgAction::Append)
                        .required(true),
                )
                .arg(
                    Arg::new(YES)
                        .short('y')
                        .long("yes")
                        .help("Submit without asking for confirmation")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("results")
                .about("Show a poll's results")
                .arg(poll_id.clone())
                .arg(
                    Arg::new(CSV)
                        .long("csv")
                        .help("Write the results as CSV to this file ('-' for stdout)")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Create a poll")
                .arg(Arg::new(TITLE).long("title").required(true))
                .arg(Arg::new(DESCRIPTION).long("description"))
                .arg(
                    Arg::new(OPTION)
                        .long("option")
                        .help("A variant label; repeat for each variant")
                        .action(ArgAction::Append)
                        .required(true),
                )
                .arg(
                    Arg::new(MULTI)
                        .long("multi")
                        .help("Allow up to this many selections")
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new(DEADLINE)
                        .long("deadline")
                        .help("ISO 8601 instant; without an offset it is taken as UTC")
                        .value_parser(deadline::parse),
                )
                .arg(
                    Arg::new(PUBLIC)
                        .long("public")
                        .help("Reveal who voted for what in the results")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a poll (admins only)")
                .arg(poll_id),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in")
                .arg(Arg::new(USERNAME).required(true))
                .arg(
                    Arg::new(PASSWORD)
                        .long("password")
                        .help("Read from stdin if not given"),
                ),
        )
        .subcommand(
            Command::new("register")
                .about("Create an account and sign in")
                .arg(Arg::new(USERNAME).required(true))
                .arg(Arg::new(EMAIL).long("email").required(true))
                .arg(Arg::new(NAME).long("name").required(true))
                .arg(
                    Arg::new(PASSWORD)
                        .long("password")
                        .help("Read from stdin if not given"),
                )
                .arg(
                    Arg::new(ADMIN)
                        .long("admin")
                        .help("Request an admin account using the configured admin token")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("logout").about("Sign out"))
        .subcommand(
            Command::new("profile")
                .about("Show or update your profile")
                .arg(Arg::new(EMAIL).long("email"))
                .arg(Arg::new(NAME).long("name"))
                .arg(Arg::new(PASSWORD).long("password")),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Client(#[from] poll_client::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    PollSpec(#[from] PollSpecError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("Only admins can delete polls")]
    NotPermitted,
}

impl Error {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Session(SessionError::Rejected(_))
            | Self::PollSpec(_)
            | Self::Pagination(_)
            | Self::NotPermitted => 2,
            _ => 1,
        }
    }
}

/// Everything a command needs: configuration, the service, and who is signed in.
struct App {
    config: Config,
    service: HttpPollService,
    auth: AuthContext,
}

impl App {
    fn new(args: &ArgMatches) -> Result<Self, Error> {
        let mut config = Config::load()?;
        if let Some(api) = args.get_one::<String>(API) {
            config = config.with_api_base_url(api);
        }
        let mut service = HttpPollService::new(&config)?;
        let auth = AuthContext::load(config.session_file())?;
        if let Some(user) = auth.user() {
            service.authenticate(user);
        }
        info!("Using poll service at {}", service.base_url());
        Ok(Self {
            config,
            service,
            auth,
        })
    }

    fn user(&self) -> Result<&User, Error> {
        Ok(self.auth.require_user()?)
    }

    /// Remember the signed-in user for later runs.
    fn save_session(&mut self) -> Result<(), Error> {
        match self.auth.user() {
            Some(user) => self.service.authenticate(user),
            None => self.service.sign_out(),
        }
        self.auth.save(self.config.session_file())?;
        Ok(())
    }

    async fn list(&self, args: &ArgMatches) -> Result<(), Error> {
        // Defaults guarantee these are present.
        let filter = *args.get_one::<StatusFilter>(STATUS).unwrap();
        let page_num = *args.get_one::<usize>(PAGE).unwrap();
        let page_size = args
            .get_one::<usize>(PAGE_SIZE)
            .copied()
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let now = Utc::now();

        let page = browse_polls(
            &self.service,
            filter,
            Pagination::new(page_num, page_size)?,
            now,
        )
        .await?;
        for poll in &page.items {
            println!("{}", poll_line(poll, now));
        }
        println!(
            "Page {} of {} ({} poll{})",
            page.page_num,
            page.page_count(),
            page.total,
            if page.total != 1 { "s" } else { "" }
        );
        Ok(())
    }

    async fn show(&self, poll_id: &str) -> Result<(), Error> {
        let poll = self.service.get_poll(poll_id).await?;
        let now = Utc::now();
        println!("{}", poll_line(&poll, now));
        if let Some(description) = &poll.description {
            println!("{description}");
        }
        if let Some(deadline) = poll.deadline {
            println!("Deadline: {}", deadline.to_rfc3339());
        }
        for variant in &poll.variants {
            println!("  [{}] {}", variant.id, variant.label);
        }
        Ok(())
    }

    async fn vote(&self, args: &ArgMatches) -> Result<(), Error> {
        let user = self.user()?;
        let poll_id: &String = args.get_one(POLL_ID).unwrap(); // Required argument is guaranteed to be present.
        let poll = self.service.get_poll(poll_id).await?;

        let mut session = VotingSession::new();
        let now = Utc::now();
        let variant_ids = args
            .get_many::<String>(VARIANTS)
            .unwrap_or_default()
            .map(|arg| resolve_variant(&poll, arg))
            .collect::<Vec<_>>();
        session.open(poll);
        for variant_id in &variant_ids {
            session.toggle(variant_id, now)?;
        }
        session.confirm(now)?;

        let labels = session
            .selection()
            .iter()
            .filter_map(|id| session.poll().and_then(|poll| poll.variant(id)))
            .map(|variant| variant.label.as_str())
            .collect::<Vec<_>>();
        println!("Your selection: {}", labels.join(", "));

        if !args.get_flag(YES) && !prompt_yes("Submit this vote?")? {
            session.cancel_confirmation()?;
            println!("Vote not submitted.");
            return Ok(());
        }
        session.submit(&self.service, user, Utc::now()).await?;
        println!("Vote recorded.");
        Ok(())
    }

    async fn results(&self, args: &ArgMatches) -> Result<(), Error> {
        let poll_id: &String = args.get_one(POLL_ID).unwrap(); // Required argument is guaranteed to be present.

        if let Some(target) = args.get_one::<String>(CSV) {
            let csv = self.service.export_results_csv(poll_id).await?;
            if target == "-" {
                print!("{csv}");
            } else {
                fs::write(target, csv).map_err(poll_client::Error::from)?;
                println!("Results written to {target}");
            }
            return Ok(());
        }

        let view = compute_result_view(&self.service.get_results(poll_id).await?);
        println!(
            "{} vote{} from {} voter{} ({:.0}% participation)",
            view.total,
            if view.total != 1 { "s" } else { "" },
            view.total_voters,
            if view.total_voters != 1 { "s" } else { "" },
            view.participation_rate
        );
        for row in &view.rows {
            println!("{row}");
            for voter in &row.voters {
                println!("    {} ({})", voter.display_name(), voter.initials());
            }
        }
        if view.winner().is_none() {
            println!("No votes yet.");
        }
        Ok(())
    }

    async fn create(&self, args: &ArgMatches) -> Result<(), Error> {
        let (mode, max_selections) = match args.get_one::<u32>(MULTI) {
            Some(max) => (SelectionMode::Multi, *max),
            None => (SelectionMode::Single, 1),
        };
        let poll = NewPoll {
            title: args.get_one::<String>(TITLE).cloned().unwrap_or_default(),
            description: args.get_one::<String>(DESCRIPTION).cloned(),
            deadline: args.get_one::<DateTime<Utc>>(DEADLINE).copied(),
            mode,
            variants: args
                .get_many::<String>(OPTION)
                .unwrap_or_default()
                .cloned()
                .collect(),
            max_selections,
            is_anonymous: !args.get_flag(PUBLIC),
            owner_user_id: self.auth.user().map(|user| user.id.clone()),
        }
        .validate(Utc::now())?;

        let created = self.service.create_poll(&poll).await?;
        println!("Created poll {}", created.id);
        Ok(())
    }

    async fn delete(&self, poll_id: &str) -> Result<(), Error> {
        if !self.user()?.can_delete_polls() {
            return Err(Error::NotPermitted);
        }
        self.service.delete_poll(poll_id).await?;
        println!("Deleted poll {poll_id}");
        Ok(())
    }

    async fn login(&mut self, args: &ArgMatches) -> Result<(), Error> {
        let credentials = Credentials {
            username: args.get_one::<String>(USERNAME).cloned().unwrap_or_default(),
            password: password(args)?,
        };
        let user = self.auth.login(&self.service, &credentials).await?;
        println!("Signed in as {}", user.display_name());
        self.save_session()
    }

    async fn register(&mut self, args: &ArgMatches) -> Result<(), Error> {
        let admin = args.get_flag(ADMIN);
        let registration = Registration {
            username: args.get_one::<String>(USERNAME).cloned().unwrap_or_default(),
            email: args.get_one::<String>(EMAIL).cloned().unwrap_or_default(),
            name: args.get_one::<String>(NAME).cloned().unwrap_or_default(),
            password: password(args)?,
            role: if admin { Role::Admin } else { Role::User },
            admin_token: admin
                .then(|| self.config.admin_token().map(str::to_string))
                .flatten(),
        };
        let user = self.auth.register(&self.service, &registration).await?;
        println!("Registered and signed in as {}", user.display_name());
        self.save_session()
    }

    fn logout(&mut self) -> Result<(), Error> {
        self.auth.logout();
        println!("Signed out.");
        self.save_session()
    }

    async fn profile(&mut self, args: &ArgMatches) -> Result<(), Error> {
        self.user()?;
        let update = ProfileUpdate {
            email: args.get_one::<String>(EMAIL).cloned(),
            name: args.get_one::<String>(NAME).cloned(),
            password: args.get_one::<String>(PASSWORD).cloned(),
        };
        let user = if update.is_empty() {
            self.service.get_profile().await?
        } else {
            self.service.update_profile(&update).await?
        };
        println!("{} <{}>", user.display_name(), user.email);
        println!("Name: {}", user.name);
        println!("Role: {}", if user.is_admin() { "admin" } else { "user" });
        if let Some(avatar) = &user.avatar_url {
            println!("Avatar: {avatar}");
        }
        self.auth.refresh(user);
        self.save_session()
    }
}

/// One-line summary of a poll for listings.
fn poll_line(poll: &Poll, now: DateTime<Utc>) -> String {
    let kind = match poll.mode {
        SelectionMode::Single => "single choice".to_string(),
        SelectionMode::Multi => format!("up to {}", engine::effective_max(poll)),
    };
    format!(
        "{}  {}  [{}, {}]",
        poll.id,
        poll.title,
        poll.status(now),
        kind
    )
}

/// Accept a variant label in place of its ID. Anything unrecognised is
/// passed through so the session can reject it.
fn resolve_variant(poll: &Poll, arg: &str) -> String {
    if poll.variant(arg).is_some() {
        return arg.to_string();
    }
    poll.variants
        .iter()
        .find(|variant| variant.label.eq_ignore_ascii_case(arg))
        .map(|variant| variant.id.clone())
        .unwrap_or_else(|| arg.to_string())
}

fn prompt_yes(question: &str) -> Result<bool, Error> {
    print!("{question} [y/N] ");
    io::stdout().flush().map_err(poll_client::Error::from)?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(poll_client::Error::from)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn password(args: &ArgMatches) -> Result<String, Error> {
    if let Some(password) = args.get_one::<String>(PASSWORD) {
        return Ok(password.clone());
    }
    print!("Password: ");
    io::stdout().flush().map_err(poll_client::Error::from)?;
    let mut password = String::new();
    io::stdin()
        .lock()
        .read_line(&mut password)
        .map_err(poll_client::Error::from)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

async fn dispatch(args: &ArgMatches) -> Result<(), Error> {
    let Some((command, sub)) = args.subcommand() else {
        unreachable!("a subcommand is required")
    };
    // Global arguments are only visible on the subcommand's matches.
    let mut app = App::new(sub)?;
    match (command, sub) {
        ("polls", sub) => app.list(sub).await,
        ("show", sub) => {
            let poll_id: &String = sub.get_one(POLL_ID).unwrap(); // Required argument is guaranteed to be present.
            app.show(poll_id).await
        }
        ("vote", sub) => app.vote(sub).await,
        ("results", sub) => app.results(sub).await,
        ("create", sub) => app.create(sub).await,
        ("delete", sub) => {
            let poll_id: &String = sub.get_one(POLL_ID).unwrap(); // Required argument is guaranteed to be present.
            app.delete(poll_id).await
        }
        ("login", sub) => app.login(sub).await,
        ("register", sub) => app.register(sub).await,
        ("logout", _) => app.logout(),
        ("profile", sub) => app.profile(sub).await,
        (other, _) => unreachable!("unknown subcommand {other}"),
    }
}

/// Run the chosen command, report any failure, and return the exit code.
async fn run(args: &ArgMatches) -> u8 {
    match dispatch(args).await {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            eprintln!("{err}");
            err.exit_code()
        }
    }
}

#[tokio::main]
async fn main() {
    // Logging is best-effort; the tool still works without a log4rs.yaml.
    if let Err(err) = log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers()) {
        eprintln!("Logging disabled: {err}");
    }
    log4rs_dynamic_filters::DynamicLevelFilter::set("reqwest", LevelFilter::Warn);

    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}
