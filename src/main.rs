use clap::Parser;
use customer_cep::app::commands;
use customer_cep::utils::error::{ErrorSeverity, ServiceError};
use customer_cep::utils::{logger, validation::Validate};
use customer_cep::CliConfig;

fn exit_with(e: &ServiceError) -> ! {
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 依錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 4,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let toml = match cli.load_toml() {
        Ok(toml) => toml,
        Err(e) => {
            eprintln!("❌ Failed to load config file: {}", e);
            std::process::exit(1);
        }
    };

    // 初始化日誌
    let verbose = cli.verbose || toml.as_ref().is_some_and(|t| t.verbose());
    if cli.json_logs || toml.as_ref().is_some_and(|t| t.json_logs()) {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    let config = cli.resolve(toml.as_ref());
    tracing::debug!("Resolved config: {:?}", config);

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    match commands::run(&config, &cli.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}
