use clap::Parser;
use sin::config::cli::{CliArgs, Command};
use sin::config::{self, AppConfig};
use sin::utils::{logger, observer::ConsoleObserver, validation::Validate};
use sin::{ArchiveFetcher, DockerRuntime, InstallError, Installer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    logger::init_cli_logger(args.debug, &config::default_base_dir());

    let Command::Install {
        service,
        json,
        redact,
    } = args.command;

    let config_path = AppConfig::resolve_path(args.config.as_deref());
    tracing::debug!("Loading configuration from: {}", config_path.display());

    let config = match AppConfig::from_file(&config_path).and_then(|config| {
        // 驗證配置
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_path.display(), error = %e, "Configuration rejected");
            fail(&service, e)
        }
    };

    let runtime = DockerRuntime::new(config.container_naming());
    let installer = Installer::new(config, ArchiveFetcher::new(), runtime)
        .with_observer(Arc::new(ConsoleObserver::new()));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling installation");
                cancel.cancel();
            }
        }
    });

    match installer.install_with_cancel(&service, &cancel).await {
        Ok(endpoint) => {
            let endpoint = if redact { endpoint.redacted() } else { endpoint };
            if json {
                println!("{}", serde_json::to_string_pretty(&endpoint)?);
            } else {
                println!("{}", endpoint);
            }
        }
        Err(e) => fail(&service, e),
    }

    Ok(())
}

fn fail(service: &str, e: InstallError) -> ! {
    let step = e
        .step()
        .map(|step| step.to_string())
        .unwrap_or_else(|| "interrupted".to_string());

    eprintln!("❌ Installing '{}' failed while {}: {}", service, step, e);
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}
