use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use decal::export::KNOWN_SHADERS;
use decal::{BatchJob, ExportJob, ExportPipeline, PreviewScheduler, Settings, output_prefix};
use decal_core::logging;
use decal_core::{Worker, WorkerBuilder};
use decal_render::font::{FontLibrary, FontObjectCache};
use decal_render::{Anchor, Color, CosmicBackend, HorizontalAlign, LayoutEngine};

/// Longest a preview render may take before the command gives up.
const PREVIEW_TIMEOUT: Duration = Duration::from_secs(30);

fn style_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .long("config")
            .value_name("FILE")
            .value_parser(value_parser!(PathBuf))
            .help("Settings file (defaults to the per-user settings.toml)")
            .global(true),
        Arg::new("size")
            .long("size")
            .value_name("PIXELS")
            .value_parser(value_parser!(u32))
            .help("Canvas size: 256, 512 or 1024")
            .global(true),
        Arg::new("font")
            .long("font")
            .value_name("NAME")
            .help("Font family name")
            .global(true),
        Arg::new("font-size")
            .long("font-size")
            .value_name("PIXELS")
            .value_parser(value_parser!(u32))
            .global(true),
        Arg::new("align")
            .long("align")
            .value_name("left|center|right")
            .help("Horizontal alignment of lines")
            .global(true),
        Arg::new("anchor")
            .long("anchor")
            .value_name("POSITION")
            .help("Where the text block sits, e.g. \"Top Left\" or \"Bottom Right\"")
            .global(true),
        Arg::new("padding")
            .long("padding")
            .value_name("PIXELS")
            .value_parser(value_parser!(i32))
            .allow_negative_numbers(true)
            .global(true),
        Arg::new("line-spacing")
            .long("line-spacing")
            .value_name("PIXELS")
            .value_parser(value_parser!(i32))
            .allow_negative_numbers(true)
            .global(true),
        Arg::new("color")
            .long("color")
            .value_name("HEX")
            .help("Text color, #RRGGBB or #RRGGBBAA")
            .global(true),
        Arg::new("outline")
            .long("outline")
            .value_name("PIXELS")
            .value_parser(value_parser!(u32))
            .help("Enable an outline of the given width")
            .global(true),
        Arg::new("outline-color")
            .long("outline-color")
            .value_name("HEX")
            .global(true),
        Arg::new("mask")
            .long("mask")
            .help("Also write the translucency mask")
            .action(ArgAction::SetTrue)
            .global(true),
        Arg::new("material")
            .long("material")
            .help("Also write the mask and a material descriptor")
            .action(ArgAction::SetTrue)
            .global(true),
        Arg::new("shader")
            .long("shader")
            .value_name("NAME")
            .help("Shader named in the material descriptor")
            .global(true),
    ]
}

fn cli() -> Command {
    Command::new("decal")
        .about("Renders text into square textures with optional masks and material files")
        .subcommand_required(true)
        .args(style_args())
        .subcommand(
            Command::new("fonts")
                .about("List installed font families")
                .arg(
                    Arg::new("search")
                        .long("search")
                        .value_name("QUERY")
                        .help("Only show names containing QUERY"),
                )
                .arg(
                    Arg::new("rescan")
                        .long("rescan")
                        .help("Ignore the font cache and scan the font directories again")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export one text texture")
                .arg(Arg::new("text").required(true).help("Text to render; \\n starts a new line"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("PATH")
                        .value_parser(value_parser!(PathBuf))
                        .help("Output path; a trailing _color.png or .png is stripped")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("numbers")
                .about("Export the digits 0 to 9, drawn at full canvas size")
                .arg(
                    Arg::new("directory")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("Render the preview panel image to a PNG")
                .arg(Arg::new("text").required(true))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("panel")
                        .long("panel")
                        .value_name("WxH")
                        .help("Panel size in pixels")
                        .default_value("500x500"),
                ),
        )
        .subcommand(
            Command::new("settings")
                .about("Print the effective settings")
                .arg(
                    Arg::new("save")
                        .long("save")
                        .help("Write the effective settings back to the settings file")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn main() -> Result<()> {
    logging::init("info");
    let matches = cli().get_matches();

    let config_path = match matches.get_one::<PathBuf>("config") {
        Some(path) => path.clone(),
        None => Settings::default_path().context("no configuration directory available")?,
    };
    let mut settings = Settings::load(&config_path)?;
    apply_overrides(&mut settings, &matches)?;

    match matches.subcommand() {
        Some(("fonts", sub)) => list_fonts(&settings, sub),
        Some(("export", sub)) => export_one(&settings, sub),
        Some(("numbers", sub)) => export_numbers(&settings, sub),
        Some(("preview", sub)) => preview(&settings, sub),
        Some(("settings", sub)) => show_config(&settings, &config_path, sub),
        _ => bail!("unknown command"),
    }
}

fn apply_overrides(settings: &mut Settings, matches: &ArgMatches) -> Result<()> {
    if let Some(&size) = matches.get_one::<u32>("size") {
        settings.set_canvas_size(size)?;
    }
    if let Some(font) = matches.get_one::<String>("font") {
        settings.font = font.clone();
    }
    if let Some(&size) = matches.get_one::<u32>("font-size") {
        settings.font_size = size;
    }
    if let Some(align) = matches.get_one::<String>("align") {
        settings.alignment = align.parse::<HorizontalAlign>()?;
    }
    if let Some(anchor) = matches.get_one::<String>("anchor") {
        settings.anchor = Anchor::from_label(anchor);
    }
    if let Some(&padding) = matches.get_one::<i32>("padding") {
        settings.padding = padding;
    }
    if let Some(&spacing) = matches.get_one::<i32>("line-spacing") {
        settings.line_spacing = spacing;
    }
    if let Some(color) = matches.get_one::<String>("color") {
        settings.text_color = color.parse::<Color>()?;
    }
    if let Some(&width) = matches.get_one::<u32>("outline") {
        settings.outline.enabled = width > 0;
        settings.outline.width = width;
    }
    if let Some(color) = matches.get_one::<String>("outline-color") {
        settings.outline.color = color.parse::<Color>()?;
    }
    if matches.get_flag("mask") {
        settings.export.mask = true;
    }
    if matches.get_flag("material") {
        settings.export.material = true;
    }
    if let Some(shader) = matches.get_one::<String>("shader") {
        if !KNOWN_SHADERS.contains(&shader.as_str()) {
            tracing::warn!(shader = %shader, "unknown shader, writing it as given");
        }
        settings.export.shader = shader.clone();
    }
    Ok(())
}

fn load_fonts(settings: &Settings, rescan: bool) -> Arc<FontLibrary> {
    let library = Arc::new(FontLibrary::new(settings.font_library_config()));
    if rescan {
        library.rescan();
    } else {
        library.load_or_scan();
    }
    library
}

fn layout_engine(settings: &Settings) -> Arc<LayoutEngine> {
    let library = load_fonts(settings, false);
    let fonts = Arc::new(FontObjectCache::new(library, Arc::new(CosmicBackend::new())));
    Arc::new(LayoutEngine::new(fonts))
}

fn text_arg(matches: &ArgMatches) -> Result<String> {
    let text = matches.get_one::<String>("text").context("missing text")?;
    Ok(text.replace("\\n", "\n"))
}

fn list_fonts(settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let library = load_fonts(settings, matches.get_flag("rescan"));
    let names = match matches.get_one::<String>("search") {
        Some(query) => library.search(query),
        None => library.catalog().names().to_vec(),
    };
    for name in &names {
        println!("{name}");
    }
    Ok(())
}

fn export_one(settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let output = matches.get_one::<PathBuf>("output").context("missing output")?;
    let mut job = ExportJob::new(settings.render_request(text_arg(matches)?), output_prefix(output))
        .with_mask(settings.export.mask);
    if settings.export.material {
        job = job.with_material(settings.export.shader.clone());
    }

    let pipeline = ExportPipeline::new(layout_engine(settings));
    let outcome = pipeline.export(&job)?;
    for file in outcome.files() {
        println!("{}", file.display());
    }
    Ok(())
}

fn export_numbers(settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let directory = matches.get_one::<PathBuf>("directory").context("missing directory")?;
    let mut batch = BatchJob::new(settings.render_request(""), directory.clone())
        .with_mask(settings.export.mask);
    if settings.export.material {
        batch = batch.with_material(settings.export.shader.clone());
    }

    let pipeline = ExportPipeline::new(layout_engine(settings));
    let outcome = pipeline.export_numbers(&batch)?;
    for (digit, error) in &outcome.failed {
        eprintln!("{digit}: {error}");
    }
    println!(
        "exported {} of 10 digits to {}",
        outcome.exported.len(),
        directory.display()
    );
    if !outcome.is_complete() {
        bail!("{} digit(s) failed", outcome.failed.len());
    }
    Ok(())
}

fn parse_panel(value: &str) -> Result<(u32, u32)> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .with_context(|| format!("panel size must look like 500x500, got {value:?}"))?;
    Ok((
        w.trim().parse().context("invalid panel width")?,
        h.trim().parse().context("invalid panel height")?,
    ))
}

fn preview(settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let output = matches.get_one::<PathBuf>("output").context("missing output")?;
    let panel = parse_panel(
        matches
            .get_one::<String>("panel")
            .map(String::as_str)
            .unwrap_or("500x500"),
    )?;

    let worker: Arc<Worker> = Arc::new(WorkerBuilder::new().name("decal-preview").build());
    let mut scheduler =
        PreviewScheduler::new(layout_engine(settings), Arc::clone(&worker), settings.debounce());
    scheduler.request(settings.render_request(text_arg(matches)?), panel, Instant::now());
    scheduler.flush();

    let ready = scheduler.wait_for_frame(PREVIEW_TIMEOUT);
    worker.stop_and_join();
    if !ready {
        bail!("preview render did not complete");
    }
    let frame = scheduler.current().context("no preview frame")?;
    save_png(&frame.image, output)?;
    println!("{} ({}px)", output.display(), frame.display_size);
    Ok(())
}

fn save_png(image: &image::RgbaImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn show_config(settings: &Settings, path: &Path, matches: &ArgMatches) -> Result<()> {
    if matches.get_flag("save") {
        settings.save(path)?;
        println!("# saved to {}", path.display());
    } else {
        println!("# {}", path.display());
    }
    print!("{}", toml::to_string_pretty(settings)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn overrides_apply_to_settings() {
        let matches = cli()
            .try_get_matches_from([
                "decal", "--size", "1024", "--anchor", "Bottom Right", "--outline", "6",
                "--color", "#ff0000", "export", "HI", "-o", "out.png", "--material",
            ])
            .unwrap();
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &matches).unwrap();
        assert_eq!(settings.canvas_size, 1024);
        assert_eq!(settings.anchor, Anchor::BottomRight);
        assert!(settings.outline.enabled);
        assert_eq!(settings.outline.width, 6);
        assert_eq!(settings.text_color, Color::rgb(255, 0, 0));
        assert!(settings.export.material);
    }

    #[test]
    fn panel_sizes_parse() {
        assert_eq!(parse_panel("640x480").unwrap(), (640, 480));
        assert_eq!(parse_panel("10X20").unwrap(), (10, 20));
        assert!(parse_panel("640").is_err());
    }
}
