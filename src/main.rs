use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use nestkey::config::{load_config, print_schema};
use nestkey::flows::{self, ImageSource, RegistrationForm};
use nestkey::startup::{build_state, watch};
use nestkey::utils::logger::init_logging;

#[derive(Parser)]
#[command(name = "nestkey")]
#[command(about = "Session persistence and auth routing for the rental marketplace")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the JSON schema of the configuration file
    Schema,
    /// Show the current session, refreshing it if needed
    Session,
    Login {
        email: String,
        password: String,
    },
    Register {
        email: String,
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        landlord: bool,
        #[arg(long)]
        company: Option<String>,
        /// Profile photo: a file path or a data: URL
        #[arg(long)]
        photo: Option<String>,
    },
    Logout,
    /// Switch between landlord and user mode
    ToggleMode {
        /// The mode the account is currently in
        #[arg(long)]
        user_mode: bool,
    },
    /// Follow auth state changes and print navigation commands
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Command::Schema = args.command {
        return match print_schema() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("could not print schema: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let config = load_config(&args.config);
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let state = match build_state(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let backend = state.backend.as_ref();

    let outcome: Result<String, String> = match args.command {
        Command::Schema => Ok(String::new()),
        Command::Session => match backend.auth().get_session().await {
            Ok(Some(session)) => serde_json::to_string_pretty(&session).map_err(|e| e.to_string()),
            Ok(None) => Ok("no session".to_string()),
            Err(e) => Err(e.to_string()),
        },
        Command::Login { email, password } => flows::login(backend, &email, &password)
            .await
            .map(|route| format!("navigate {route}"))
            .map_err(|e| e.to_string()),
        Command::Register {
            email,
            password,
            name,
            landlord,
            company,
            photo,
        } => {
            let mut form = RegistrationForm {
                email,
                password,
                name,
                ..Default::default()
            };
            form.set_landlord(landlord);
            if landlord {
                form.company_name = company.unwrap_or_default();
                form.profile_image = photo.as_deref().map(ImageSource::parse);
            }
            flows::register(backend, &form)
                .await
                .map(|route| format!("navigate {route}"))
                .map_err(|e| e.to_string())
        }
        Command::Logout => flows::sign_out(backend)
            .await
            .map(|route| format!("navigate {route}"))
            .map_err(|e| e.to_string()),
        Command::ToggleMode { user_mode } => flows::toggle_user_mode(backend, user_mode)
            .await
            .map(|toggle| format!("temp_user_mode={} navigate {}", toggle.user_mode, toggle.route))
            .map_err(|e| e.to_string()),
        Command::Watch => watch(&state)
            .await
            .map(|()| String::new())
            .map_err(|e| e.to_string()),
    };

    match outcome {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}
