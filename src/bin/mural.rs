use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mural", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a document's blocks into the generation prompt.
    Compile(CompileArgs),
    /// Run the post-processing pipeline over a source image.
    Render(RenderArgs),
    /// Print a document's blocks and history.
    Summary(SummaryArgs),
}

#[derive(Parser, Debug)]
struct CompileArgs {
    /// Input document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input document JSON (labs state, seed, aspect ratio).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Source raster image.
    #[arg(long)]
    source: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// TTF/OTF font file for text overlays.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Grain nonce; keep the default for reproducible output.
    #[arg(long, default_value_t = 0)]
    grain_nonce: u64,
}

#[derive(Parser, Debug)]
struct SummaryArgs {
    /// Input document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compile(args) => cmd_compile(args),
        Command::Render(args) => cmd_render(args),
        Command::Summary(args) => cmd_summary(args),
    }
}

fn read_document(path: &Path) -> anyhow::Result<(mural::Document, mural::SchemaRegistry)> {
    let registry = mural::default_registry()?;
    let f = File::open(path).with_context(|| format!("open document '{}'", path.display()))?;
    let raw: serde_json::Value =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse document JSON")?;
    let doc = mural::Document::from_value(raw, &registry)?;
    Ok((doc, registry))
}

fn cmd_compile(args: CompileArgs) -> anyhow::Result<()> {
    let (doc, registry) = read_document(&args.in_path)?;
    let effective =
        mural::compute_effective_blocks(&doc.blocks, &[], doc.use_base_style, &registry);
    let prompt = mural::compile(
        &effective,
        &registry,
        &mural::CompileOpts {
            base_style: &doc.base_style,
            use_base_style: doc.use_base_style,
            aspect_ratio: doc.aspect_ratio,
        },
    );
    println!("{prompt}");
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (doc, _registry) = read_document(&args.in_path)?;

    let source = image::open(&args.source)
        .with_context(|| format!("open source image '{}'", args.source.display()))?
        .to_rgba8();
    let frame =
        mural::Frame::from_straight(source.width(), source.height(), source.into_raw())?;

    let mut library = mural::FontLibrary::new();
    if let Some(font_path) = &args.font {
        let bytes = std::fs::read(font_path)
            .with_context(|| format!("read font '{}'", font_path.display()))?;
        library.set_default(bytes);
    } else if !doc.labs_state.overlays.is_empty() {
        anyhow::bail!("document has text overlays; pass --font to render them");
    }

    let mut compositor = mural::Compositor::new();
    let opts = mural::RenderOpts {
        seed: doc.seed,
        grain_nonce: args.grain_nonce,
        ..Default::default()
    };
    let rendered = compositor.render(&frame, &doc.labs_state, &library, &opts)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &rendered.to_straight(),
        rendered.width,
        rendered.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let (doc, registry) = read_document(&args.in_path)?;

    println!("seed: {}", doc.seed);
    println!("aspect ratio: {}", doc.aspect_ratio.as_str());
    println!("blocks:");
    for block in &doc.blocks {
        let active = if block.is_active { "active" } else { "inactive" };
        println!(
            "  {} ({}, {})",
            mural::smart_label(block, &registry),
            block.block_type,
            active
        );
    }
    if !doc.history.is_empty() {
        println!("history (newest first):");
        for entry in doc.history.entries() {
            println!("  {} (seed {})", entry.action, entry.seed);
        }
    }
    Ok(())
}
