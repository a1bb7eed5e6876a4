/// Cast Cache - actor metadata cache service
///
/// Caches actor records from an external people directory and serves
/// sorted listings, detail views and distribution statistics.

use cast_cache::{config::ServerConfig, context::AppContext, error::CastResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> CastResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| "cast_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Print banner
    print_banner();

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ______           __     ______           __
  / ____/___ ______/ /_   / ____/___ ______/ /_  ___
 / /   / __ `/ ___/ __/  / /   / __ `/ ___/ __ \/ _ \
/ /___/ /_/ (__  ) /_   / /___/ /_/ / /__/ / / /  __/
\____/\__,_/____/\__/   \____/\__,_/\___/_/ /_/\___/

        Actor metadata cache v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
