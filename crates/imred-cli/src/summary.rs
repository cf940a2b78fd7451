use console::Style;
use imred_core::calib::CalibrationReport;
use imred_core::frame::ReductionMode;
use imred_core::pipeline::{ReductionConfig, ReductionOutput, ReductionProduct};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    warning: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            warning: Style::new().yellow(),
        }
    }
}

pub fn print_reduction_summary(config: &ReductionConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("imred Reduction"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(15)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Masters"),
        s.path.apply_to(config.masters_dir().display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output_dir().display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Dataset"),
        s.value.apply_to(format!("{:04}", config.dataset))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Mode"),
        s.method.apply_to(config.mode)
    );
    if config.force_rebuild {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Masters"),
            s.warning.apply_to("forced rebuild")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Calibration"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bias"),
        s.method.apply_to(&config.calibration.bias.method)
    );
    let flat = &config.calibration.flat;
    println!(
        "    {:<12}{}",
        s.label.apply_to("Flat"),
        s.method.apply_to(&flat.method)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Flat band"),
        s.value.apply_to(format!(
            "p{} in [{}, {}]",
            flat.percentile, flat.min_level, flat.max_level
        ))
    );
    println!();

    match config.mode {
        ReductionMode::Spectroscopy => print_spectroscopy_section(&s, config),
        ReductionMode::Imaging => print_imaging_section(&s, config),
    }
}

fn print_spectroscopy_section(s: &Styles, config: &ReductionConfig) {
    let spectro = &config.spectroscopy;
    println!("  {}", s.header.apply_to("Spectroscopy"));
    let order: Vec<String> = spectro.layout.order.iter().map(|d| d.to_string()).collect();
    println!(
        "    {:<12}{}",
        s.label.apply_to("Detectors"),
        s.value.apply_to(order.join(" "))
    );
    let sky = if spectro.sky_subtraction {
        s.method.apply_to("median of outer quarters".to_string())
    } else {
        s.disabled.apply_to("disabled".to_string())
    };
    println!("    {:<12}{}", s.label.apply_to("Sky"), sky);
    println!(
        "    {:<12}{}",
        s.label.apply_to("Binning"),
        s.value.apply_to(format!("{} columns", spectro.spectral_binning))
    );
    match spectro.wavelength_range() {
        Some((a, b)) => println!(
            "    {:<12}{}",
            s.label.apply_to("Wavelength"),
            s.value.apply_to(format!("{a} .. {b}"))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Wavelength"),
            s.disabled.apply_to("no solution")
        ),
    }
    println!();
}

fn print_imaging_section(s: &Styles, config: &ReductionConfig) {
    println!("  {}", s.header.apply_to("Imaging"));
    let detectors: Vec<String> = config
        .imaging
        .selected_detectors()
        .iter()
        .map(|d| d.to_string())
        .collect();
    println!(
        "    {:<12}{}",
        s.label.apply_to("Detectors"),
        s.value.apply_to(detectors.join(" "))
    );
    println!();
}

pub fn print_calibration_report(report: &CalibrationReport) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Master frames"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Ready"),
        s.value.apply_to(report.built.len())
    );
    if !report.skipped.is_empty() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Skipped"),
            s.warning.apply_to(report.skipped.len())
        );
        for (key, err) in &report.skipped {
            println!("      {} {}", s.label.apply_to(key), s.warning.apply_to(err));
        }
    }
    if !report.invalid.is_empty() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Invalid"),
            s.warning.apply_to(report.invalid.len())
        );
        for (path, err) in &report.invalid {
            println!(
                "      {} {}",
                s.path.apply_to(path.display()),
                s.warning.apply_to(err)
            );
        }
    }
    println!();
}

pub fn print_output(output: &ReductionOutput) {
    let s = Styles::new();

    let shape = match &output.product {
        ReductionProduct::Spectrum(mosaic) => {
            format!("{}x{} spectrum", mosaic.data.ncols(), mosaic.data.nrows())
        }
        ReductionProduct::Images(images) => format!("{} detector images", images.len()),
    };
    println!(
        "  {:<14}{}",
        s.label.apply_to("Object"),
        s.value.apply_to(&output.name)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Product"),
        s.method.apply_to(shape)
    );
    for path in &output.files {
        println!("  {:<14}{}", "", s.path.apply_to(path.display()));
    }
    println!();
}
