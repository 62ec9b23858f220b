use casc_extract::{
    CascExtract, CascExtractError, Cli, OutputFormatter, OutputMode, ProgressManager,
    UserFriendlyError,
};
use clap::error::ErrorKind;
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => -1,
            };
        }
    };

    let progress_manager = ProgressManager::for_verbosity(cli.verbose, cli.quiet);
    setup_logging(&cli, &progress_manager);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let app = match CascExtract::from_cli(&cli) {
        Ok(app) => app.with_progress_manager(progress_manager),
        Err(e) => {
            print_startup_error(&e);
            return e.exit_code();
        }
    };

    if cli.dry_run {
        return handle_dry_run(&app);
    }

    match app.run() {
        Ok(report) => {
            app.output_formatter().print_extraction_report(&report);
            0
        }
        Err(e) => {
            app.handle_error(&e);
            e.exit_code()
        }
    }
}

fn setup_logging(cli: &Cli, progress_manager: &ProgressManager) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("casc_extract={}", cli.log_level())));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(progress_manager.log_writer())
        .try_init();
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "casc-extract.toml".to_string());

    match CascExtract::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  casc-extract --source <storage> --config {}", config_path);
            println!("\nEdit the file to customize settings for your needs.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            e.exit_code()
        }
    }
}

fn handle_dry_run(app: &CascExtract) -> i32 {
    let formatter = app.output_formatter();
    let config = app.config();

    formatter.info("DRY RUN MODE - nothing will be deleted or extracted");
    formatter.print_separator();

    let backend = config.storage.backend.resolve(app.source());
    formatter.detail("Source", &app.source().display().to_string());
    formatter.detail("Backend", &format!("{} (requested {})", backend, config.storage.backend));
    formatter.detail("Pattern", &config.storage.pattern);

    match casc_extract::PathFilter::from_config(&config.filter) {
        Ok(filter) => formatter.detail("Filter", &filter.describe()),
        Err(e) => {
            formatter.print_user_friendly_error(&e);
            return e.exit_code();
        }
    }

    formatter.detail("Destination", &config.output.destination.display().to_string());
    formatter.detail("Manifest", &config.manifest_path().display().to_string());
    formatter.detail(
        "Layout",
        if config.output.preserve_structure { "mirror storage paths" } else { "flat" },
    );
    if config.output.lowercase {
        formatter.detail("Case", "lowercase");
    }

    if app.is_list_only() {
        formatter.info("List only: the manifest would be rewritten, nothing extracted");
    } else if !config.output.clean_destination {
        formatter.info("The destination tree would be kept (--no-clean)");
    } else if casc_extract::is_protected_destination(&config.output.destination, app.source()) {
        formatter.warning(
            "The destination would NOT be deleted: it contains the source storage or the working directory",
        );
    } else {
        formatter.warning(&format!(
            "{} would be deleted before extraction",
            config.output.destination.display()
        ));
    }

    formatter.print_separator();
    formatter.success("Dry run completed successfully");
    0
}

fn print_startup_error(error: &CascExtractError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use casc_extract::Config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let cli = Cli::try_parse_from([
            "casc-extract",
            "--generate-config",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(handle_generate_config(&cli), 0);

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[storage]"));
        assert!(Config::load_from_file(&config_path).is_ok());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("out");
        fs::create_dir_all(&destination).unwrap();
        fs::write(destination.join("keep.txt"), "keep").unwrap();

        let mut config = Config::default();
        config.output.destination = destination.clone();
        let app = CascExtract::new(config, temp_dir.path(), OutputMode::Plain, 0, true);

        assert_eq!(handle_dry_run(&app), 0);
        assert!(destination.join("keep.txt").exists());
    }

    #[test]
    fn test_dry_run_reports_missing_listfile() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.filter.mode = casc_extract::FilterMode::Listfile;
        config.filter.listfile = Some(temp_dir.path().join("missing.txt"));

        let app = CascExtract::new(config, temp_dir.path(), OutputMode::Plain, 0, true);
        assert_eq!(handle_dry_run(&app), -1);
    }
}
