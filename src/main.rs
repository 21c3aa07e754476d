use clap::Parser;
use proteus::cli::{load_raw_config, Cli};
use proteus::engine::DynamicForm;
use proteus::schema;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let raw = load_raw_config(&cli.config)?;

    let config = match schema::validate_config(&raw) {
        Ok(config) => config,
        Err(violations) => {
            for violation in &violations {
                error!(path = %violation.path, code = %violation.code, "{}", violation.message);
            }
            anyhow::bail!(
                "{} failed validation with {} violation(s)",
                cli.config.display(),
                violations.len()
            );
        }
    };

    let form = DynamicForm::from_config(config)?;
    info!(
        controls = form.qualified_keys().await.len(),
        "{} is valid",
        cli.config.display()
    );

    if cli.tree {
        for key in form.qualified_keys().await {
            println!("{key}");
        }
    }
    if cli.values {
        println!("{}", serde_json::to_string_pretty(&form.value().await)?);
    }

    Ok(())
}
