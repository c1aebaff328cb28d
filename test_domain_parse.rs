use domain_checker::{DomainParser, RuleKind, RuleTable};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Testing domain parsing against the embedded suffix list...");

    let excluded = vec!["tk".to_string()];
    let table = RuleTable::embedded(&excluded);
    println!(
        "Loaded {} rules ({} normal, {} wildcard, {} exception)",
        table.len(),
        table.rules(RuleKind::Normal).count(),
        table.rules(RuleKind::Wildcard).count(),
        table.rules(RuleKind::Exception).count()
    );

    let parser = DomainParser::new(Arc::new(table));

    let samples = [
        "https://www.example.com/path?q=1",
        "mail.google.co.uk",
        "shop.example.com.au",
        "user.github.io",
        "a.b.kawasaki.jp",
        "www.city.kawasaki.jp",
        "foo.bar.ck",
        "free-prizes.tk",
        "http://localhost:8080/",
        "com",
        "bad..example.com",
    ];

    for sample in samples {
        println!("\n=== {sample} ===");
        match parser.try_parse(sample) {
            Ok(parsed) => {
                println!("Subdomain: '{}'", parsed.subdomain);
                println!("SLD:       '{}'", parsed.sld);
                println!("TLD:       '{}'", parsed.tld);
                if let Some(rule) = &parsed.matched_rule {
                    println!("Rule:      {rule} ({})", rule.kind());
                }
                println!("Excluded:  {}", parsed.is_excluded);
            }
            Err(e) => println!("Not parsed: {e}"),
        }
    }

    println!("\nDomain parsing test completed.");
    Ok(())
}
