//! Upstream group listing.

use tokio::runtime::Runtime;

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::pipeline::GroupMatcher;

/// Print every upstream group with the category it would run as.
pub fn cmd_groups(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let matcher = GroupMatcher::new(&config.groups)?;
    let client = CatalogClient::new(config)?;

    rt.block_on(async {
        let mut groups = client.fetch_groups().await?;
        groups.sort_by_key(|g| g.to_lowercase());

        let mut selected = 0;
        for group in &groups {
            match matcher.classify(group) {
                Some(category) => {
                    selected += 1;
                    println!("{:<6} {}", category.as_str(), group);
                }
                None => println!("{:<6} {}", "-", group),
            }
        }
        println!();
        println!("{} groups, {} selected", groups.len(), selected);
        Ok(())
    })
}
