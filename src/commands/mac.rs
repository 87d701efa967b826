//! MAC address readout

use crate::cli::ToolArgs;
use espprov_core::flash::FlashTool;

pub fn run(tool_args: &ToolArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mac = tool_args.tool().read_mac()?;
    println!("{}", mac);
    Ok(())
}
