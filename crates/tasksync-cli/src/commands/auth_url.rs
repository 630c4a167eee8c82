use tasksync_core::integrations::oauth::consent_url;

use super::CliResult;

pub fn run(client_id: &str, redirect_uri: &str, open: bool) -> CliResult {
    let url = consent_url(client_id, redirect_uri);
    println!("{url}");
    if open {
        open::that(&url)?;
    }
    Ok(())
}
