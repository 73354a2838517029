//! Key command - encode or decode session cache keys.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use shoal_session::{SessionContext, key};

use super::Context;

/// Arguments for the key command.
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Context path of the deployment (e.g. /app)
    #[arg(required_unless_present = "decode")]
    pub context_path: Option<String>,

    /// Virtual host of the deployment
    #[arg(required_unless_present = "decode")]
    pub virtual_host: Option<String>,

    /// Session id
    #[arg(required_unless_present = "decode")]
    pub id: Option<String>,

    /// Decode this key instead of encoding one
    #[arg(long, conflicts_with_all = ["context_path", "virtual_host", "id"])]
    pub decode: Option<String>,
}

#[derive(Debug, Serialize)]
struct KeyOutput {
    key: String,
    context_path: String,
    virtual_host: String,
    id: String,
}

/// Run the key command.
pub fn run(args: KeyArgs, ctx: &Context) -> Result<()> {
    let decoding = args.decode.is_some();
    let output = match args.decode {
        Some(encoded) => {
            let (context_path, virtual_host, id) = key::decode(&encoded)?;
            KeyOutput {
                key: encoded,
                context_path,
                virtual_host,
                id,
            }
        }
        None => {
            // Canonicalize the same way a running store does.
            let scope = SessionContext::new(
                args.context_path.as_deref().unwrap_or_default(),
                args.virtual_host.as_deref(),
                "cli",
            );
            let id = args.id.unwrap_or_default();
            KeyOutput {
                key: key::encode(scope.context_path(), scope.virtual_host(), &id),
                context_path: scope.context_path().to_string(),
                virtual_host: scope.virtual_host().to_string(),
                id,
            }
        }
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if decoding {
        println!("context_path: {}", output.context_path);
        println!("virtual_host: {}", output.virtual_host);
        println!("id:           {}", output.id);
    } else {
        println!("{}", output.key);
    }
    Ok(())
}
