//! `config validate` and `config show`.

use colored::Colorize;
use compass::config::{self, Config, DiscoveryResult};

/// Check the closest config file. Quiet on success, cargo-style error on
/// failure.
pub fn validate(discovery: &DiscoveryResult) -> Result<(), i32> {
    let Some(path) = discovery.closest() else {
        eprintln!("error: no config found to validate");
        return Err(1);
    };

    let cfg = config::load_single_file(path).map_err(|e| {
        eprintln!("{}", e);
        1
    })?;

    match &cfg.inventory {
        Some(inventory) if !inventory.exists() => {
            eprintln!(
                "error: inventory file not found: {}\n  --> {}",
                inventory.display(),
                path.display()
            );
            Err(1)
        }
        _ => Ok(()),
    }
}

/// Print the merged configuration and where it came from.
pub fn show(discovery: &DiscoveryResult) -> Result<(), i32> {
    let cfg = config::load(discovery).map_err(|e| {
        eprintln!("{}", e);
        1
    })?;

    if cfg.has_sources() {
        for source in &cfg.sources {
            println!("Using: {}", source.display().to_string().dimmed());
        }
    } else {
        println!("{}", "No config found. Using defaults.".dimmed());
    }
    println!();
    for line in describe(&cfg) {
        println!("{}", line);
    }
    Ok(())
}

fn describe(cfg: &Config) -> Vec<String> {
    let not_set = || "(not set)".dimmed().to_string();
    let path_or_unset = |path: &Option<std::path::PathBuf>| match path {
        Some(p) if p.exists() => p.display().to_string().green().to_string(),
        Some(p) => format!("{} {}", p.display(), "(not found)".red()),
        None => not_set(),
    };

    let mut lines = vec![
        format!("{}: {}", "concurrency".cyan(), cfg.concurrency),
        format!(
            "{}: {}",
            "tick_interval_ms".cyan(),
            cfg.tick_interval.as_millis()
        ),
        format!("{}: {}", "inventory".cyan(), path_or_unset(&cfg.inventory)),
        format!(
            "{}: {}",
            "affinity_path".cyan(),
            path_or_unset(&cfg.affinity_path)
        ),
    ];

    if cfg.projects.is_empty() {
        lines.push(format!(
            "{}: {}",
            "projects".cyan(),
            "(all projects in the inventory)".dimmed()
        ));
    } else {
        lines.push(format!("{}:", "projects".cyan()));
        lines.extend(cfg.projects.iter().map(|p| format!("  - {}", p.green())));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn discovery_for(dir: &TempDir, content: &str) -> DiscoveryResult {
        let path = dir.path().join("compass.yaml");
        fs::write(&path, content).unwrap();
        DiscoveryResult {
            project_root: Some(dir.path().to_path_buf()),
            project_config: Some(path),
            global_config: None,
        }
    }

    #[test]
    fn test_validate_without_config_fails() {
        assert_eq!(validate(&DiscoveryResult::default()), Err(1));
    }

    #[test]
    fn test_validate_accepts_good_config() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("inventory.json"), "{}").unwrap();
        let discovery = discovery_for(&dir, "inventory: inventory.json\nconcurrency: 4\n");

        assert_eq!(validate(&discovery), Ok(()));
    }

    #[test]
    fn test_validate_rejects_missing_inventory() {
        let dir = TempDir::new().unwrap();
        let discovery = discovery_for(&dir, "inventory: nowhere.json\n");

        assert_eq!(validate(&discovery), Err(1));
    }

    #[test]
    fn test_validate_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let discovery = discovery_for(&dir, "projcts: [a]\n");

        assert_eq!(validate(&discovery), Err(1));
    }

    #[test]
    fn test_describe_lists_projects() {
        colored::control::set_override(false);
        let cfg = Config {
            projects: vec!["alpha".into(), "beta".into()],
            ..Default::default()
        };
        let lines = describe(&cfg);

        assert!(lines.contains(&"concurrency: 8".to_string()));
        assert!(lines.contains(&"tick_interval_ms: 100".to_string()));
        assert!(lines.contains(&"inventory: (not set)".to_string()));
        assert!(lines.ends_with(&[
            "projects:".to_string(),
            "  - alpha".to_string(),
            "  - beta".to_string()
        ]));
    }
}
