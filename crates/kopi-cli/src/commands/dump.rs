//! `kopi dump`: print a bundled sample as a loadable unit file.

use anyhow::Context;

pub fn execute(name: &str) -> anyhow::Result<()> {
    let sample = kopi_examples::find(name).with_context(|| format!("unknown sample '{}'", name))?;
    println!("{}", sample.unit.to_json_pretty()?);
    Ok(())
}
