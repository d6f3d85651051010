use askdb::agent::{ModelGateway, Pipeline, create_model_gateway};
use askdb::cli::{Args, Mode};
use askdb::config::Config;
use askdb::database::{ConnectionInfo, DatabaseClient, create_database_client};
use askdb::password_sanitizer::sanitize_connection_url;
use askdb::server::{self, AppState};
use askdb::{cli_core, logging};
use clap::{CommandFactory, Parser};
use std::error::Error;
use std::io;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info};

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        let mut command = Args::command();
        clap_complete::generate(
            clap_complete::Shell::from(shell),
            &mut command,
            "askdb",
            &mut io::stdout(),
        );
        return Ok(());
    }

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with(format!("Error: {e}")),
    };
    if let Err(e) = config.validate() {
        exit_with(format!("Error: {e}"));
    }

    let _log_guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {e}");
            None
        }
    };
    debug!("Starting with {:?}", args);

    let Some(url) = args.database_url.clone().or_else(|| config.database.url.clone()) else {
        exit_with(
            "Error: no database connection string. Set DB_CONNECTION_STRING or pass --database-url.",
        );
    };

    let connection_info = match ConnectionInfo::parse_url(&url) {
        Ok(info) => info,
        Err(e) => exit_with(format!("Error connecting to database: {e}")),
    };
    let database: Arc<dyn DatabaseClient> =
        match create_database_client(connection_info, &config.database).await {
            Ok(client) => Arc::from(client),
            Err(e) => exit_with(format!("Error connecting to database: {e}")),
        };
    info!(
        "Database connection established: {}",
        sanitize_connection_url(&url)
    );

    let schema_prompt = match database.introspect().await {
        Ok(snapshot) => snapshot.to_prompt(),
        Err(e) => {
            error!("Schema introspection failed: {}", e);
            database.close().await;
            exit_with(format!(
                "Error loading database schema: {e}\nPlease check your database connection and permissions."
            ));
        }
    };
    info!("Database schema loaded");

    if matches!(args.mode, Some(Mode::Schema)) {
        println!("{schema_prompt}");
        database.close().await;
        return Ok(());
    }

    let gateway: Arc<dyn ModelGateway> = match create_model_gateway(&config.model) {
        Ok(gateway) => Arc::from(gateway),
        Err(e) => {
            database.close().await;
            exit_with(format!("Error initializing model: {e}"));
        }
    };

    config.chat.show_query = config.chat.show_query && !args.hide_query;
    let show_query = config.chat.show_query;
    let pipeline = Pipeline::new(gateway, database.clone(), schema_prompt, config.chat.clone());

    let outcome: Result<(), Box<dyn Error>> = if !args.questions.is_empty() {
        cli_core::run_questions(pipeline, show_query, &args.questions).await;
        Ok(())
    } else {
        match args.mode {
            Some(Mode::Serve { bind }) => {
                let bind_address = bind.unwrap_or_else(|| config.server.bind_address.clone());
                let state = AppState::new(pipeline, config.server.max_sessions);
                server::serve(state, &bind_address).await.map_err(Into::into)
            }
            _ => cli_core::run_interactive(pipeline, show_query)
                .await
                .map_err(Into::into),
        }
    };

    database.close().await;
    outcome
}
