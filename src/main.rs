use clap::{Arg, ArgAction, Command};
use domain_checker::{
    CheckAnalysis, ClamAvScanner, Config, DomainCheckHandler, DomainParser, ParsedDomain,
    RuleTable,
};
use log::LevelFilter;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

fn cli() -> Command {
    Command::new("domain-checker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Public suffix aware domain parsing and URL safety checks")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(Config::default_path()),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Load the suffix rules and ping ClamAV, then exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("parse")
                .long("parse")
                .value_name("DOMAIN")
                .help("Split a domain or URL into subdomain, SLD and TLD")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .value_name("URL")
                .help("Run the full check pipeline against a URL")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print results as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(Config::default_path());
    let config_exists = Path::new(config_path).exists();
    let config = if config_exists {
        match Config::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {e:#}");
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config.log_level()
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if !config_exists {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    let json = matches.get_flag("json");

    if matches.get_flag("test-config") {
        test_config(&config).await;
        return;
    }

    let domains: Vec<String> = matches
        .get_many::<String>("parse")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let urls: Vec<String> = matches
        .get_many::<String>("check")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    if domains.is_empty() && urls.is_empty() {
        if let Err(e) = cli().print_help() {
            eprintln!("Error printing help: {e}");
        }
        println!();
        return;
    }

    if !domains.is_empty() {
        parse_domains(&config, &domains, json).await;
    }

    if !urls.is_empty() && !check_urls(&config, &urls, json).await {
        process::exit(1);
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

async fn load_rule_table(config: &Config) -> RuleTable {
    match RuleTable::load(
        &config.effective_rule_source(),
        &config.domain_name_parser.excluded_domain_list,
    )
    .await
    {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error loading suffix rules: {e}");
            process::exit(1);
        }
    }
}

async fn test_config(config: &Config) {
    println!("🔍 Testing configuration...");
    println!();

    let table = load_rule_table(config).await;
    println!("✅ Suffix rules loaded: {}", table.len());
    let excluded: Vec<&str> = table.excluded_suffixes().collect();
    if !excluded.is_empty() {
        println!("   Excluded suffixes: {}", excluded.join(", "));
    }

    let checker = &config.domain_name_checker;
    println!(
        "   Checker enabled: {}, basic check: {}, parser: {}, call URL: {}, ClamAV: {}",
        checker.use_domain_name_checker,
        checker.use_basic_domain_check,
        checker.use_domain_name_parser,
        checker.call_url,
        checker.use_clam_av
    );

    if checker.use_clam_av && config.clam_av.use_clam_av {
        let scanner = ClamAvScanner::new(&config.clam_av.host, config.clam_av.port)
            .with_timeout(Duration::from_secs(config.clam_av.timeout_seconds));
        match scanner.ping().await {
            Ok(true) => {
                let version = scanner.version().await.unwrap_or_default();
                println!("✅ ClamAV reachable at {} {version}", scanner.address());
            }
            Ok(false) => {
                println!("❌ ClamAV at {} did not answer PONG", scanner.address());
                process::exit(1);
            }
            Err(e) => {
                println!("❌ ClamAV unreachable: {e}");
                process::exit(1);
            }
        }
    } else if checker.use_clam_av {
        println!("⚠️  Scanning is requested but the clam_av section is disabled");
    }

    println!();
    println!("✅ Configuration is valid");
}

async fn parse_domains(config: &Config, domains: &[String], json: bool) {
    let parser = DomainParser::new(Arc::new(load_rule_table(config).await));

    let results: Vec<(&String, ParsedDomain)> = domains
        .iter()
        .map(|domain| (domain, parser.parse(domain)))
        .collect();

    if json {
        let output: Vec<serde_json::Value> = results
            .iter()
            .map(|(input, parsed)| serde_json::json!({ "input": input, "result": parsed }))
            .collect();
        print_json(&output);
        return;
    }

    for (input, parsed) in &results {
        println!(
            "{input}: {}",
            describe_domain(parsed, &config.domain_name_parser.excluded_domain_list)
        );
    }
}

/// Returns `false` when any URL could not be analysed.
async fn check_urls(config: &Config, urls: &[String], json: bool) -> bool {
    let handler = match DomainCheckHandler::from_config(config).await {
        Ok(Some(handler)) => handler,
        Ok(None) => {
            eprintln!("Domain name checker is disabled in the configuration");
            return false;
        }
        Err(e) => {
            eprintln!("Error setting up domain checker: {e:#}");
            return false;
        }
    };

    let mut analyses = Vec::new();
    let mut ok = true;
    for url in urls {
        match handler.analyze(url).await {
            Ok(analysis) => analyses.push(analysis),
            Err(e) => {
                eprintln!("❌ {url}: {e}");
                ok = false;
            }
        }
    }

    if json {
        print_json(&analyses);
    } else {
        for analysis in &analyses {
            print_analysis(analysis, &config.domain_name_parser.excluded_domain_list);
        }
    }

    ok
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error serializing results: {e}");
            process::exit(1);
        }
    }
}

fn describe_domain(parsed: &ParsedDomain, excluded_list: &[String]) -> String {
    if parsed.is_valid {
        let rule = parsed
            .matched_rule
            .as_ref()
            .map(|rule| format!("{rule} ({})", rule.kind()))
            .unwrap_or_default();
        let mut description = format!(
            "subdomain='{}' sld='{}' tld='{}' rule={rule}",
            parsed.subdomain, parsed.sld, parsed.tld
        );
        if parsed.is_excluded {
            description.push_str(" [excluded]");
        } else if parsed.hits_domain_list(excluded_list) {
            description.push_str(" [on exclusion list]");
        }
        description
    } else if parsed.is_excluded {
        "excluded".to_string()
    } else {
        "invalid".to_string()
    }
}

fn print_analysis(analysis: &CheckAnalysis, excluded_list: &[String]) {
    println!("🔗 {}", analysis.original_url);
    for (index, end_point) in analysis.end_point_analysis.iter().enumerate() {
        println!(
            "   Endpoint {}: https={} {}",
            index + 1,
            end_point.basic_domain_validation,
            describe_domain(&end_point.domain, excluded_list)
        );
    }

    match &analysis.last_redirection_url {
        Some(url) => println!("   Final URL: {url}"),
        None => println!("   Final URL: (request failed)"),
    }
    if let Some(status) = analysis.http_status {
        println!("   HTTP status: {status}");
    }
    println!(
        "   Malware scan: {:?} {}",
        analysis.av_result.result, analysis.av_result.raw_result
    );
    for infected in &analysis.av_result.infected_files {
        println!("   🦠 {}: {}", infected.file_name, infected.virus_name);
    }

    if analysis.is_safe() {
        println!("   ✅ SAFE");
    } else {
        println!("   🚨 UNSAFE");
    }
    println!();
}
