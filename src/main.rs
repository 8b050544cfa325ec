use std::env;
use trackway::{Pipeline, RunConfig, Step};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let program = env::args().next().unwrap_or_else(|| "trackway".to_string());
    let (cfg, step) = parse_args(&program)?;
    env_logger::Builder::new()
        .filter_level(if cfg.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();
    let mut pipeline = Pipeline::new(cfg);
    pipeline.run(step)
}

fn parse_args(program: &str) -> Result<(RunConfig, Step), String> {
    let mut cfg = RunConfig::load(std::path::Path::new("."))?;
    let mut step = Step::All;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("{}", usage(program));
                std::process::exit(0);
            }
            "--shade" => step = Step::Shade,
            "--rorpo" => step = Step::Rorpo,
            "--sobel" => step = Step::Sobel,
            "--fbsd" => step = Step::Fbsd,
            "--seeds" => step = Step::Seeds,
            "--asd" => step = Step::Asd,
            "--sawing" => step = Step::Sawing,
            "--hill" => step = Step::Hill,
            "--seed-check" => step = Step::SeedCheck,
            "--verbose" => cfg.verbose = true,
            "--map" => cfg.out_map = true,
            "--color" => cfg.false_color = true,
            "--dtm" => cfg.back_dtm = true,
            "--invert" => cfg.color_inversion = true,
            "--connected" => cfg.connected = true,
            "--export" => cfg.export = true,
            "--export-bounds" => {
                cfg.export = true;
                cfg.export_bounds = true;
            }
            "--half" => cfg.half_size_seeds = true,
            "--no-rorpo" => cfg.skip_rorpo = true,
            "--buffer" => {
                let value = next_value(&mut args, "--buffer", program)?;
                cfg.buffer_size = value
                    .parse()
                    .map_err(|_| format!("Invalid buffer size '{value}'"))?;
            }
            "--pad" => {
                let value = next_value(&mut args, "--pad", program)?;
                let pad: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid pad size '{value}'"))?;
                if pad != 0 && pad % 2 == 0 {
                    return Err(format!("Pad size must be odd, got {pad}"));
                }
                cfg.pad_size = pad;
            }
            "--tail" => {
                let value = next_value(&mut args, "--tail", program)?;
                cfg.tail_min_size = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid tail size '{value}'"))?,
                );
            }
            "--tiles" => {
                let value = next_value(&mut args, "--tiles", program)?;
                cfg.tiles = value.into();
            }
            "--res" => {
                let value = next_value(&mut args, "--res", program)?;
                cfg.res_dir = value.into();
            }
            _ => {
                return Err(format!("Unknown option '{arg}'\n{}", usage(program)));
            }
        }
    }
    Ok((cfg, step))
}

fn next_value(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
    program: &str,
) -> Result<String, String> {
    args.next()
        .ok_or_else(|| format!("{flag} expects a value\n{}", usage(program)))
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [step] [options]\n\n\
Steps (default: full automatic run):\n  \
--sawing          seed production only (shade .. seeds)\n  \
--shade --rorpo --sobel --fbsd --seeds --asd\n                    one intermediate step at a time\n  \
--hill            hill-shading image only\n  \
--seed-check      dump the saved seed buckets\n\n\
Options:\n  \
--tiles FILE      tile name list (default tiles.txt)\n  \
--res DIR         results directory (default steps/)\n  \
--buffer N        point tile byte budget (default 0: all resident)\n  \
--pad N           pad side in tiles, odd (default 0: whole map)\n  \
--tail N          minimal accepted tail run\n  \
--half            emit seeds at doubled resolution\n  \
--connected       only rasterise connected plateaux\n  \
--export          shapefile export of road centerlines\n  \
--export-bounds   shapefile export of road bounds\n  \
--map             PNG dump of the step output\n  \
--dtm             shaded DTM as image background\n  \
--color           one random colour per road\n  \
--invert          swap road/background polarity\n  \
--verbose         progress logs\n"
    )
}
