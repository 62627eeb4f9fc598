use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use myssue::auth::RegistrationOutcome;
use myssue::startup::{ClientConfig, Session};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
Usage: myssue <command>

Commands:
  status        Show the stored session
  register      Register this device unless already registered
  reissue       Fetch a fresh access token
  get <path>    Authenticated GET of <path> relative to the base URL

Options:
  --version     Print the version and exit

Environment:
  MYSSUE_BASE_URL   Backend base URL
  MYSSUE_DATA_DIR   Directory for stored credentials and cookies
  MYSSUE_PUSH_TOKEN Push token sent with device registration
  RUST_LOG          Log filter (default: info)";

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "myssue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_status(session: &Session) {
    let creds = session.cache().credentials();
    println!("base url:     {}", session.config().base_url);
    println!("data dir:     {}", session.config().data_dir.display());
    println!(
        "device uuid:  {}",
        creds.device_uuid.as_deref().unwrap_or("(none)")
    );
    println!(
        "user id:      {}",
        creds
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!(
        "access token: {}",
        if creds.has_token() { "present" } else { "(none)" }
    );
    println!(
        "registered:   {}",
        if creds.is_registered() { "yes" } else { "no" }
    );
    if let Some(jar) = session.cookie_jar() {
        println!("cookies:      {}", jar.stored().len());
    }
}

async fn run(command: &str, args: &[String]) -> Result<()> {
    let session = Session::connect(ClientConfig::from_env()).wrap_err("Failed to start session")?;

    let result = match command {
        "status" => {
            print_status(&session);
            Ok(())
        }
        "register" => {
            let push_token = std::env::var("MYSSUE_PUSH_TOKEN").ok();
            match session.register_if_needed(push_token.as_deref()).await {
                RegistrationOutcome::AlreadyRegistered { user_id } => {
                    println!("Already registered as user {}", user_id);
                    Ok(())
                }
                RegistrationOutcome::Registered {
                    device_uuid,
                    user_id,
                    token_received,
                } => {
                    println!("Registered device {}", device_uuid);
                    if let Some(id) = user_id {
                        println!("User id: {}", id);
                    }
                    if !token_received {
                        println!("Warning: the backend did not return an access token");
                    }
                    Ok(())
                }
                RegistrationOutcome::Failed {
                    device_uuid,
                    reason,
                } => Err(eyre!(
                    "Registration of device {} failed: {}",
                    device_uuid,
                    reason
                )),
            }
        }
        "reissue" => match session.reissue().await {
            Ok(_) => {
                println!("Access token reissued");
                Ok(())
            }
            Err(e) => {
                eprintln!("Hint: {}", e.recovery_hint());
                Err(e).wrap_err("Token reissue failed")
            }
        },
        "get" => match args.first() {
            Some(path) => match session.get(path).await {
                Ok(response) => {
                    println!("HTTP {}", response.status);
                    println!("{}", String::from_utf8_lossy(&response.body));
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            None => Err(eyre!("get requires a path\n\n{}", USAGE)),
        },
        other => Err(eyre!("Unknown command: {}\n\n{}", other, USAGE)),
    };

    session.shutdown().await;
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --version flag before any initialization
    if std::env::args().any(|arg| arg == "--version") {
        println!("myssue {}", VERSION);
        std::process::exit(0);
    }

    color_eyre::install()?;
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    run(command, rest).await
}
