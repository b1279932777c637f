mod appstate;
mod config;
mod controller;
mod error;
mod mail;
mod plugins;
mod server;

use std::{net::SocketAddr, sync::Arc};

use appstate::AppState;
use config::Config;
use error::Error;
use plugins::signup::SignupController;
use server::Server;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn create_server(state: &AppState) -> Result<Server, Error> {
    let mut server = Server::new();
    server.add_controllers(Arc::new(SignupController::from_state(state)), None)?;
    for mount in server.mounts() {
        for (verb, path) in &mount.routes {
            info!(
                target: "server.routes",
                controller = %mount.controller,
                %verb,
                base_path = %mount.base_path,
                %path,
                "route"
            );
        }
    }
    Ok(server)
}

async fn create_listener(addr: SocketAddr) -> Result<TcpListener, Error> {
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Serving app at: http://{}", addr);
            Ok(listener)
        }
        Err(err) => Err(Error::SocketBind(format!("{addr}: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;
    let mailer = mail::from_config(&config.mail)?;
    let bind_addr = config.bind_addr;
    let state = AppState::new(config, mailer);

    let app = create_server(&state)?.into_router(state);
    let listener = create_listener(bind_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "loaded environment file");
    }

    if let Err(err) = run().await {
        error!(%err, "backend stopped");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{controller::HttpVerb, mail::LogMailer};

    #[test]
    fn signup_controller_is_mounted_at_api_signup() {
        let config = Config::from_lookup(|_| None).unwrap();
        let state = AppState::new(config, Arc::new(LogMailer::new("no-reply@localhost")));
        let server = create_server(&state).unwrap();
        let mounts = server.mounts();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].controller, "SignupController");
        assert_eq!(mounts[0].base_path, "/api/signup");
        assert_eq!(mounts[0].routes, vec![(HttpVerb::Post, "/".to_string())]);
    }

    #[tokio::test]
    async fn occupied_address_is_a_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let err = create_listener(addr).await.unwrap_err();
        assert!(matches!(err, Error::SocketBind(_)));
    }
}
