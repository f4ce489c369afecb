//! Header command handler

use std::path::Path;

use anyhow::{Context, Result};

use poppel_core::npy;

use crate::output::{format_bytes, format_shape, Output, OutputFormat};

/// Print the header of a standalone `.npy` file
pub fn show(path: &Path, output: &Output) -> Result<()> {
    let header = npy::load_header_path(path)
        .with_context(|| format!("Failed to read array header from {:?}", path))?;
    let len = header.len()?;
    let num_bytes = header.num_bytes()?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "descr": header.dtype.descr(),
                    "fortran_order": header.fortran_order,
                    "shape": header.shape,
                    "len": len,
                    "bytes": num_bytes
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{} {}", header.dtype, format_shape(&header.shape));
        }
        OutputFormat::Human => {
            println!("File:          {}", path.display());
            println!("dtype:         {}", header.dtype);
            println!("fortran_order: {}", header.fortran_order);
            println!("shape:         {}", format_shape(&header.shape));
            println!("elements:      {}", len);
            println!("payload:       {}", format_bytes(num_bytes));
        }
    }

    Ok(())
}
