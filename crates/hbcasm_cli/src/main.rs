use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use hbcasm_lib::{DumpOptions, Module};

use crate::cli::{Cli, TopLevel};

mod cli;

fn disasm(input: &Path, output: &Path, options: &DumpOptions) -> Result<()> {
    let module = hbcasm_lib::read_file(input).with_context(|| format!("failed to read {input:?}"))?;
    hbcasm_lib::dump(&module, output, options).with_context(|| format!("failed to write project {output:?}"))?;
    Ok(())
}

fn asm(project: &Path, output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{output:?} already exists (use --force to overwrite)");
    }
    let module = hbcasm_lib::load(project).with_context(|| format!("failed to load project {project:?}"))?;
    hbcasm_lib::write_file(output, &module).with_context(|| format!("failed to write {output:?}"))?;
    Ok(())
}

fn print_info(module: &Module) {
    println!("version:   {}", module.version());
    println!("functions: {}", module.function_count());
    println!("strings:   {}", module.string_count());
    println!("code:      {} bytes at {:#x}", module.code.len(), module.code_start());
    match &module.debug_info {
        Some(d) => println!("debug:     {} bytes", d.len()),
        None => println!("debug:     none"),
    }
    for i in 0..module.function_count() {
        let Ok(f) = module.get_function(i, false) else {
            continue;
        };
        println!(
            "  #{i:<5} {:#010x} {:>6} bytes  {} params, {} registers, {} symbols{}  {}",
            f.header.offset,
            f.header.bytecode_size,
            f.param_count,
            f.register_count,
            f.symbol_count,
            if f.header.overflowed { " (large)" } else { "" },
            f.name
        );
    }
}

fn run(command: TopLevel) -> Result<()> {
    match command {
        TopLevel::Disasm { input, output, force, strict } => disasm(&input, &output, &DumpOptions { force, strict }),
        TopLevel::Asm { project, output, force } => asm(&project, &output, force),
        TopLevel::Info { input } => {
            let module = hbcasm_lib::read_file(&input).with_context(|| format!("failed to read {input:?}"))?;
            print_info(&module);
            Ok(())
        }
        TopLevel::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbosity.level())
        .parse_default_env()
        .init();

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return;
    };
    if let Err(e) = run(command) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
