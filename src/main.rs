use dns_name_resolver::{ResolutionOutcome, ResolverOptions, ResolverRegistry, ResultListener};
use std::{env, process::ExitCode, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dns_name_resolver=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(target) = env::args().nth(1) else {
        eprintln!("usage: dns-name-resolver <target>   e.g. dns:///example.com:443");
        return ExitCode::FAILURE;
    };

    let options = ResolverOptions::from_env();
    let registry = ResolverRegistry::with_defaults();
    let resolver = match registry.create(&target, &options) {
        Ok(resolver) => resolver,
        Err(e) => {
            tracing::error!(error = %e, "Cannot create resolver");
            return ExitCode::FAILURE;
        }
    };

    let listener: Arc<dyn ResultListener> = Arc::new(|outcome: ResolutionOutcome| match outcome {
        ResolutionOutcome::Resolved(addresses) => {
            let json = serde_json::to_string(&addresses).unwrap_or_default();
            tracing::info!(count = addresses.len(), addresses = %json, "Resolved");
        }
        ResolutionOutcome::Failed(status) => {
            tracing::warn!(%status, "Resolution failed");
        }
    });

    if let Err(e) = resolver.start(listener) {
        tracing::error!(error = %e, "Cannot start resolver");
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    resolver.dispose();
    ExitCode::SUCCESS
}
