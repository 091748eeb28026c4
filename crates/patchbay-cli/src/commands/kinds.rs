//! Node kind listing command.

use clap::Args;
use patchbay_engine::{NodeKind, ParamValue, registry};

#[derive(Args)]
pub struct KindsArgs {
    /// Print default parameters as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: KindsArgs) -> anyhow::Result<()> {
    for kind in NodeKind::ALL {
        println!("{:<10} {}", kind.name(), registry::summary(kind));

        let defaults = registry::default_params(kind);
        if defaults.is_empty() {
            continue;
        }

        if args.json {
            println!("           {}", serde_json::to_string(&defaults)?);
        } else {
            for (key, value) in &defaults {
                let rendered = match value {
                    ParamValue::Number(n) => n.to_string(),
                    ParamValue::Choice(c) => c.clone(),
                };
                println!("           {key} = {rendered}");
            }
        }
    }

    Ok(())
}
