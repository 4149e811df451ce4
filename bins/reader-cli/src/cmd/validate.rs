use crate::config::{AppConfig, ValidateArgs};
use crate::error::CliError;

/// Validate the reader section. Never opens a broker connection.
pub fn run(args: ValidateArgs) -> Result<(), CliError> {
    let config = AppConfig::load(&args.config)?;
    let validated = config.reader.validate()?;
    println!(
        "ok: topic={} start={} read_compacted={} name={}",
        validated.topic, validated.start, validated.read_compacted, validated.name
    );
    Ok(())
}
