use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bilingual_epub::config::DEFAULT_CONFIG_PATH;
use bilingual_epub::{
    AssembleOptions, AssemblyReport, BilingualConfig, EpubError, GoogleTranslator, Result,
    RetryingTranslator, create_bilingual_epub,
};
use clap::Parser;

/// 📚 bilingual-epub - 双语EPUB生成工具
#[derive(Parser)]
#[command(name = "bilingual-epub")]
#[command(about = "把EPUB电子书转换为原文与译文逐段对照的双语版本")]
#[command(version)]
struct Args {
    /// EPUB文件路径
    #[arg(help = "要转换的EPUB文件路径", required_unless_present = "init_config")]
    ebook_file: Option<PathBuf>,

    #[arg(long, help = "译文语言代码（如 en、zh-CN）")]
    translate_to: Option<String>,

    #[arg(long, help = "原文语言代码，缺省时使用书籍元数据中的语言")]
    translate_from: Option<String>,

    #[arg(long, help = "不翻译的前N个章节")]
    skip_section: Option<usize>,

    #[arg(short, long, help = "输出文件路径（默认: <原文件名>_bilingual.epub）")]
    out: Option<PathBuf>,

    #[arg(long, help = "存放临时输出文件的目录（默认: 输出文件所在目录）")]
    tmp: Option<PathBuf>,

    #[arg(long, help = "每个翻译段落包含的句子数")]
    sentences_per_paragraph: Option<NonZeroUsize>,

    #[arg(long, help = "替换原书封面的图片文件")]
    cover_image: Option<PathBuf>,

    #[arg(short, long, help = "配置文件路径", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(long, help = "在配置文件路径生成默认配置后退出")]
    init_config: bool,

    #[arg(long, help = "任一章节翻译失败时中止转换")]
    strict: bool,

    #[arg(short, long, help = "显示详细日志")]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();

    println!("📚 bilingual-epub - 双语EPUB生成工具");

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ 错误: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    if args.init_config {
        BilingualConfig::generate_default_config(&args.config)?;
        println!("📝 已生成默认配置文件: {}", args.config.display());
        return Ok(());
    }

    let input = input_path(&args)?;

    let config = load_config(&args)?;
    let output = args.out.clone().unwrap_or_else(|| default_output_path(&input));

    let mut options = AssembleOptions::from_config(&config);
    options.cover_image = args.cover_image.clone();

    let translator = RetryingTranslator::from_settings(GoogleTranslator::new(&config.translation)?, &config.translation);

    println!("📖 输入: {}", input.display());
    println!("🌐 翻译: {} -> {}", options.source_language.as_deref().unwrap_or("(书籍语言)"), options.target_language);

    let report = create_bilingual_epub(&input, &output, args.tmp.as_deref(), &options, &translator)?;
    print_report(&report, &output);

    Ok(())
}

/// 待转换的EPUB路径，未给出时返回配置错误
fn input_path(args: &Args) -> Result<PathBuf> {
    args.ebook_file
        .clone()
        .ok_or_else(|| EpubError::ConfigError("缺少要转换的EPUB文件路径".to_string()))
}

/// 读取配置文件并用命令行参数覆盖；默认路径下没有配置文件时使用默认配置
fn load_config(args: &Args) -> Result<BilingualConfig> {
    let mut config = if args.config.exists() {
        log::info!("读取配置文件: {}", args.config.display());
        BilingualConfig::from_file(&args.config)?
    } else if args.config.as_os_str() != DEFAULT_CONFIG_PATH {
        BilingualConfig::from_file(&args.config)?
    } else {
        BilingualConfig::default_config()
    };

    if let Some(target) = &args.translate_to {
        config.target_language = target.clone();
    }
    if let Some(source) = &args.translate_from {
        config.source_language = Some(source.clone());
    }
    if let Some(skip) = args.skip_section {
        config.skip_sections = skip;
    }
    if let Some(sentences) = args.sentences_per_paragraph {
        config.sentences_per_paragraph = sentences;
    }
    if args.strict {
        config.strict = true;
    }

    Ok(config)
}

/// `<目录>/<原文件名>_bilingual.epub`
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "book".to_string());
    input.with_file_name(format!("{}_bilingual.epub", stem))
}

fn print_report(report: &AssemblyReport, output: &Path) {
    println!("\n📊 转换结果: 《{}》", report.title);
    println!("  语言: {} -> {}", report.source_language, report.target_language);
    println!("  ✅ 已翻译章节: {}", report.translated.len());
    println!("  ⏭️  跳过章节: {}", report.skipped.len());

    if !report.failed.is_empty() {
        println!("  ⚠️  翻译失败、保留原文的章节: {}", report.failed.len());
        for failure in &report.failed {
            println!("    - {}: {}", failure.href, failure.error);
        }
    }

    println!("  📦 共 {} 个文件", report.entries);
    println!("🎉 已生成双语EPUB: {}", output.display());
}
