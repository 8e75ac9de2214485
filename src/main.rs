use tokio::net::TcpListener;
use tokio::signal;

use gatewire::config::Config;
use gatewire::gateway::events::GatewayEvent;
use gatewire::gateway::{GatewayClient, GatewayConfig};
use gatewire::health::{self, HealthState};
use gatewire::responder::Responder;
use gatewire::rest::RestClient;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatewire=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let rest = RestClient::new(config.api_base.clone(), config.token.clone());

    // Credential check before touching the gateway
    match rest.current_user().await {
        Ok(user) => tracing::info!("authenticated as {} ({})", user.username, user.id),
        Err(e) => {
            tracing::error!("credential check failed: {e}");
            std::process::exit(1);
        }
    }
    match rest.list_guilds().await {
        Ok(guilds) => {
            tracing::info!("member of {} guild(s)", guilds.len());
            for guild in &guilds {
                tracing::info!("- {} ({})", guild.name, guild.id);
            }
        }
        Err(e) => tracing::warn!("could not list guilds: {e}"),
    }

    let mut gateway_config = GatewayConfig::new(config.token.clone());
    gateway_config.intents = config.intents;
    gateway_config.reconnect = config.reconnect.clone();
    let (client, mut events) = GatewayClient::new(rest.clone(), gateway_config);

    let app = health::router(HealthState {
        connection: client.state_handle(),
    });
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind health listener");
    eprintln!("  \x1b[32m→ health endpoint on 0.0.0.0:{}\x1b[0m", config.port);
    eprintln!();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("health server error");
    });

    let responder = Responder::new(rest);
    client.connect();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let exit_code = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(GatewayEvent::Ready(data)) => {
                    let username = data
                        .get("user")
                        .and_then(|u| u.get("username"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("?");
                    tracing::info!("gateway ready, logged in as {username}");
                }
                Some(GatewayEvent::Disconnected { reason }) => {
                    tracing::warn!("gateway connection lost: {reason}");
                }
                Some(GatewayEvent::Reconnecting { attempt, delay }) => {
                    tracing::info!("reconnecting in {delay:?} (attempt {attempt})");
                }
                Some(GatewayEvent::Fatal { attempts }) => {
                    tracing::error!("gateway gave up after {attempts} attempts");
                    break 1;
                }
                Some(event) => responder.handle_event(&event).await,
                None => break 0,
            },
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                client.destroy();
                break 0;
            }
        }
    };

    std::process::exit(exit_code);
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mgatewire\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mapi\x1b[0m          {}", config.api_base);
    eprintln!("  \x1b[2mintents\x1b[0m      {:#x}", config.intents);
    eprintln!("  \x1b[2mhealth port\x1b[0m  {}", config.port);
    if let Some(ref app_id) = config.application_id {
        eprintln!("  \x1b[2mapp id\x1b[0m       {app_id}");
    }
    eprintln!();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
