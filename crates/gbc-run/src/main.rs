use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use gbc_core::{
    Console,
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
};
use log::info;

#[derive(Parser)]
#[command(about = "Run a Game Boy ROM headless for a number of frames")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Path to boot ROM file
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Write the last frame to this PNG file
    #[arg(long)]
    png: Option<PathBuf>,

    /// Print the most recent instructions when the run ends
    #[arg(long)]
    trace: bool,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

fn write_png(path: &Path, rgba: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let w = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(w, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgba)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let mut console = Console::new();

    if let Some(path) = &args.boot_rom {
        let loaded = fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|data| console.load_boot_rom(data).map_err(|e| e.to_string()));
        if let Err(e) = loaded {
            eprintln!("Failed to load boot ROM: {e}");
            return ExitCode::FAILURE;
        }
    }

    let data = match fs::read(&args.rom) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to read ROM: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = console.load_cartridge(data) {
        eprintln!("Failed to load ROM: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(cart) = console.cartridge() {
        let info = &cart.info;
        println!("Title:     {}", info.title);
        println!("Type:      {:#04X} ({:?})", info.type_code, info.features.mbc);
        println!("ROM:       {} KiB", cart.rom.len() / 1024);
        println!("RAM banks: {}", info.ram_banks);
        println!("Licensee:  {}", info.licensee);
        println!("Color:     {:?}", info.compatibility);
        println!(
            "Checksums: header {}, global {}",
            if info.header_checksum_valid { "ok" } else { "BAD" },
            if info.global_checksum_valid { "ok" } else { "BAD" }
        );
    }

    console.set_trace(args.trace);
    console.start();

    let mut result = Ok(());
    for _ in 0..args.frames {
        if let Err(e) = console.run_frame() {
            result = Err(e);
            break;
        }
    }
    info!("Ran {} frames", console.frames());

    if let Some(path) = &args.png {
        match write_png(path, console.frame_buffer()) {
            Ok(()) => println!("Wrote {}", path.display()),
            Err(e) => eprintln!("Failed to write {}: {e}", path.display()),
        }
    }

    let snap = console.debug_snapshot();
    println!(
        "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X}",
        snap.a,
        snap.flags.to_byte(),
        snap.b,
        snap.c,
        snap.d,
        snap.e,
        snap.h,
        snap.l,
        snap.sp,
        snap.pc
    );
    println!(
        "cycles:{} mode:{:?} LY:{} IME:{} halted:{}",
        snap.cycles, snap.ppu_mode, snap.ly, snap.ime as u8, snap.halted
    );
    for sample in &snap.memory {
        let bytes: Vec<String> = sample.bytes.iter().map(|b| format!("{b:02X}")).collect();
        println!("{:>6} {:04X}: {}", sample.region, sample.addr, bytes.join(" "));
    }

    if args.trace {
        for entry in console.trace() {
            println!("{:04X}: {:02X} ({} cycles)", entry.pc, entry.opcode, entry.cycles);
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Emulation stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
