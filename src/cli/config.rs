use crate::config::generate::generate_starter_config;
use crate::config::{user_config_path, SYSTEM_CONFIG_PATH};
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer ~/.config/beacontail/config.yml, fall back to /etc/beacontail/config.yml
    let config_path = match user_config_path() {
        Some(user_config) => match user_config.parent().map(fs::create_dir_all) {
            Some(Err(_)) => {
                eprintln!("Warning: Could not create {}", user_config.display());
                eprintln!("Falling back to {}", SYSTEM_CONFIG_PATH);
                PathBuf::from(SYSTEM_CONFIG_PATH)
            }
            _ => user_config,
        },
        None => PathBuf::from(SYSTEM_CONFIG_PATH),
    };

    if config_path.exists() {
        eprintln!(
            "Error: Config file already exists at {}",
            config_path.display()
        );
        eprintln!("Remove it first or use --stdout to print the config");
        std::process::exit(1);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    match crate::config::load_config(&path) {
        Ok(_) => {
            println!("✓ Config is valid");
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Config validation failed:\n{}", e);
            std::process::exit(1);
        }
    }
}
