//! Request command handlers.

use anyhow::{bail, Result};
use tracing::info;

use replayfetch::{Failure, Fetcher, Method, RequestPayload, Success};

use super::RequestArgs;

/// Send to an entity through the router for `method`.
pub(crate) async fn cmd_entity(
    fetcher: &Fetcher,
    method: Method,
    entity: &str,
    args: RequestArgs,
) -> Result<()> {
    let pick = args.pick.clone();
    let payload = build_payload(args)?;
    let result = fetcher.router(method).dispatch(entity, payload).await;
    print_result(result, pick.as_deref())
}

/// Send to an explicit path.
pub(crate) async fn cmd_request(
    fetcher: &Fetcher,
    method: Method,
    path: &str,
    args: RequestArgs,
) -> Result<()> {
    let pick = args.pick.clone();
    let payload = build_payload(args)?.path(path);
    let result = fetcher.http().verb(method, payload).await;
    print_result(result, pick.as_deref())
}

fn build_payload(args: RequestArgs) -> Result<RequestPayload> {
    let mut payload = RequestPayload::new();

    for param in &args.params {
        let Some((name, value)) = param.split_once('=') else {
            bail!("Invalid --param '{}', expected name=value", param);
        };
        payload = payload.param(name.trim(), value.trim());
    }

    for header in &args.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("Invalid --header '{}', expected \"Name: value\"", header);
        };
        payload = payload.header(name.trim(), value.trim())?;
    }

    if let Some(data) = args.data {
        payload = payload.body(data);
    }
    if let Some(key) = args.key {
        payload = payload.key(key);
    }
    if args.no_cache {
        payload = payload.cache(false);
    }

    Ok(payload)
}

/// Split `--pick` into field names. An empty string selects no fields.
fn parse_pick(pick: &str) -> Vec<&str> {
    pick.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

fn print_result(result: std::result::Result<Success, Failure>, pick: Option<&str>) -> Result<()> {
    match result {
        Ok(success) => {
            if let Some(ref key) = success.key {
                info!(key = %key, status = success.response.status.as_u16(), "Request succeeded");
            }
            let fields = pick.map(parse_pick);
            let output = success.pick(fields.as_deref());
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(failure) => bail!(failure),
    }
}
