use anyhow::{bail, Context};
use clap::{crate_version, Arg, ArgAction, Command};
use vasm::{
    driver::{self, Options},
    link::{Endian, Format},
};

use std::{fs, path::PathBuf, process, str::FromStr};

fn main() -> anyhow::Result<()> {
    let args = Command::new("vasm")
        .version(crate_version!())
        .about("Multi-target assembler for LR Assembly")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .required(true)
                .help("Input source file"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Target format (openlud, nexfuse, mercury, solarisvm, jade, siax)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATH")
                .default_value("a.out")
                .help("Output file"),
        )
        .arg(
            Arg::new("no-stylist")
                .long("no-stylist")
                .action(ArgAction::SetTrue)
                .help("Disable the style pass"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .alias("enforce-stylist")
                .action(ArgAction::SetTrue)
                .help("Abort on any style finding"),
        )
        .arg(
            Arg::new("allow-large-numbers")
                .long("allow-large-numbers")
                .alias("ln")
                .action(ArgAction::SetTrue)
                .help("Disable the lexical number range check"),
        )
        .arg(
            Arg::new("little-endian")
                .long("little-endian")
                .alias("le")
                .action(ArgAction::SetTrue)
                .conflicts_with("big-endian")
                .help("Persist wide words little-endian"),
        )
        .arg(
            Arg::new("big-endian")
                .long("big-endian")
                .alias("be")
                .action(ArgAction::SetTrue)
                .help("Persist wide words big-endian"),
        )
        .arg(
            Arg::new("optimization")
                .short('O')
                .value_name("LEVEL")
                .default_value("1")
                .help("Optimization level; 0 keeps unreachable procedures"),
        )
        .get_matches();

    let format = match args.get_one::<String>("format") {
        Some(name) => match Format::from_str(name) {
            Ok(format) => Some(format),
            Err(()) => bail!("Unknown format `{}`", name),
        },

        None => None,
    };

    let endian = if args.get_flag("big-endian") {
        Some(Endian::Big)
    } else if args.get_flag("little-endian") {
        Some(Endian::Little)
    } else {
        None
    };

    let optimization_level = args
        .get_one::<String>("optimization")
        .unwrap()
        .parse()
        .context("Bad optimization level")?;

    let file: PathBuf = args.get_one::<String>("file").unwrap().into();
    let mut options = Options {
        output: args.get_one::<String>("output").unwrap().into(),
        format,
        stylist: !args.get_flag("no-stylist"),
        strict_stylist: args.get_flag("strict"),
        allow_big_numbers: args.get_flag("allow-large-numbers"),
        endian,
        optimization_level,
        file,
    };

    let text = fs::read_to_string(&options.file)
        .with_context(|| format!("Failed to read: {}", options.file.display()))?;

    let name = options.file.display().to_string();

    let mut image = Vec::new();
    if let Err(report) = driver::build(&text, &name, &mut options, &mut image) {
        eprint!("{}", report);
        process::exit(1);
    }

    fs::write(&options.output, &image)
        .with_context(|| format!("Failed to write: {}", options.output.display()))?;

    Ok(())
}
