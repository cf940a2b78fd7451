use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::calib::{
    build_bias_library, build_flat_library, CalibrationReport, DirectoryStore, MasterLibrary,
    MasterStore,
};
use crate::consts::{KEY_DEC, KEY_RA};
use crate::error::Result;
use crate::frame::{ReductionMode, SkyPosition};
use crate::header::Header;
use crate::io::catalog::FrameCatalog;
use crate::io::preview::save_preview;
use crate::io::products::{
    image_product_path, product_header, product_name, spectrum_preview_path,
    spectrum_product_path, write_product, ProductKind,
};
use crate::post::{bin_spectral, subtract_sky_background};
use crate::reduce::{
    assemble_images_with_progress, assemble_spectrum_with_progress, CcdCalibrator,
    ExposureSource, ImageSet, SpectrumMosaic,
};
use crate::wcs::{LinearWavelengthSolution, PlateSolver};

use super::config::ReductionConfig;
use super::types::{NoOpReporter, PipelineStage, ProgressReporter, ReductionOutput, ReductionProduct};

/// Master library stored in the configured masters directory.
pub fn open_library(config: &ReductionConfig) -> MasterLibrary<DirectoryStore> {
    MasterLibrary::new(
        DirectoryStore::new(config.masters_dir()),
        config.force_rebuild,
    )
}

/// Build every master bias, then every master flat of the configured mode.
///
/// Group failures are collected in the report; they only surface as errors
/// when a later calibration needs the missing master.
pub fn build_calibrations<S: MasterStore>(
    catalog: &FrameCatalog,
    config: &ReductionConfig,
    library: &MasterLibrary<S>,
    reporter: &dyn ProgressReporter,
) -> CalibrationReport {
    reporter.begin_stage(PipelineStage::BuildingBiases, None);
    let mut report = build_bias_library(catalog, library, &config.calibration.bias);
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::BuildingFlats, None);
    report.merge(build_flat_library(
        catalog,
        config.mode,
        &config.flat_selection(),
        library,
        &config.calibration.flat,
    ));
    reporter.finish_stage();

    info!(
        built = report.built.len(),
        skipped = report.skipped.len(),
        invalid = report.invalid.len(),
        "Calibrations ready"
    );
    report
}

/// Run a full reduction with a thread-safe progress reporter.
///
/// `plate_solver` is consulted for imaging products only; a failed solve
/// leaves the product without a celestial solution.
pub fn run_reduction_reported(
    config: &ReductionConfig,
    reporter: Arc<dyn ProgressReporter>,
    plate_solver: Option<Arc<dyn PlateSolver>>,
) -> Result<ReductionOutput> {
    config.validate()?;
    info!(
        input = %config.input.display(),
        dataset = config.dataset,
        mode = %config.mode,
        "Starting reduction"
    );

    reporter.begin_stage(PipelineStage::Cataloging, None);
    let catalog = FrameCatalog::scan(&config.input)?;
    reporter.finish_stage();

    let library = open_library(config);
    let calibration = build_calibrations(&catalog, config, &library, reporter.as_ref());

    let calibrator = CcdCalibrator::new(&library, config.mode, config.crop().clone());
    let source = ExposureSource {
        directory: &config.input,
        prefix: &config.exposure_prefix,
        dataset: config.dataset,
    };

    let (name, product, files) = match config.mode {
        ReductionMode::Spectroscopy => {
            reporter.begin_stage(
                PipelineStage::Calibrating,
                Some(config.spectroscopy.layout.order.len()),
            );
            let r = Arc::clone(&reporter);
            let mosaic = assemble_spectrum_with_progress(
                &calibrator,
                &source,
                &config.spectroscopy.layout,
                move |done| r.advance(done),
            )?;
            reporter.finish_stage();

            let mosaic = post_process(mosaic, config, reporter.as_ref())?;
            let name = product_name(config.save_name.as_deref(), mosaic.headers.first());
            let files = write_spectrum(&mosaic, &name, config, reporter.as_ref())?;
            (name, ReductionProduct::Spectrum(mosaic), files)
        }
        ReductionMode::Imaging => {
            let detectors = config.imaging.selected_detectors();
            reporter.begin_stage(PipelineStage::Calibrating, Some(detectors.len()));
            let r = Arc::clone(&reporter);
            let images = assemble_images_with_progress(
                &calibrator,
                &source,
                &detectors,
                move |done| r.advance(done),
            )?;
            reporter.finish_stage();

            let first_header = images.values().next().map(|ccd| &ccd.header);
            let name = product_name(config.save_name.as_deref(), first_header);
            let files = write_images(
                &images,
                &name,
                config,
                plate_solver.as_deref(),
                reporter.as_ref(),
            )?;
            (name, ReductionProduct::Images(images), files)
        }
    };

    info!(name = %name, files = files.len(), "Reduction complete");
    Ok(ReductionOutput {
        name,
        product,
        files,
        calibration,
    })
}

/// Run a full reduction without progress reporting or plate solving.
pub fn run_reduction(config: &ReductionConfig) -> Result<ReductionOutput> {
    run_reduction_reported(config, Arc::new(NoOpReporter), None)
}

fn post_process(
    mut mosaic: SpectrumMosaic,
    config: &ReductionConfig,
    reporter: &dyn ProgressReporter,
) -> Result<SpectrumMosaic> {
    let spectro = &config.spectroscopy;
    reporter.begin_stage(PipelineStage::PostProcessing, None);
    if spectro.sky_subtraction {
        mosaic.data = subtract_sky_background(&mosaic.data);
    }
    if spectro.spectral_binning > 1 {
        mosaic.data = bin_spectral(&mosaic.data, spectro.spectral_binning)?;
    }
    reporter.finish_stage();
    Ok(mosaic)
}

fn write_spectrum(
    mosaic: &SpectrumMosaic,
    name: &str,
    config: &ReductionConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<PathBuf>> {
    let out_dir = config.output_dir();
    let base = mosaic.headers.first().cloned().unwrap_or_default();
    let mut header = product_header(&base, ProductKind::Spectrum);
    if let Some((lambda_min, lambda_max)) = config.spectroscopy.wavelength_range() {
        LinearWavelengthSolution::new(mosaic.data.dim(), lambda_min, lambda_max)?
            .write_cards(&mut header);
    }

    reporter.begin_stage(PipelineStage::Writing, Some(1 + usize::from(config.preview)));
    let mut files = Vec::new();
    let path = spectrum_product_path(out_dir, name, config.dataset);
    write_product(&path, &mosaic.data, &header)?;
    files.push(path);
    reporter.advance(files.len());

    if config.preview {
        let path = spectrum_preview_path(out_dir, name, config.dataset);
        save_preview(&mosaic.data, &path)?;
        files.push(path);
        reporter.advance(files.len());
    }
    reporter.finish_stage();
    Ok(files)
}

fn write_images(
    images: &ImageSet,
    name: &str,
    config: &ReductionConfig,
    plate_solver: Option<&dyn PlateSolver>,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<PathBuf>> {
    reporter.begin_stage(PipelineStage::Writing, Some(images.len()));
    let mut files = Vec::with_capacity(images.len());
    for (detector, ccd) in images {
        let mut header = product_header(&ccd.header, ProductKind::Image);
        if let Some(solver) = plate_solver {
            let approx = pointing(&ccd.header).and_then(|p| p.to_degrees().ok());
            match solver.solve(&ccd.data, approx) {
                Ok(solution) => solution.write_cards(&mut header),
                Err(e) => warn!(detector = %detector, error = %e, "Plate solving failed"),
            }
        }
        let path = image_product_path(
            config.output_dir(),
            name,
            *detector,
            &config.exposure_prefix,
            config.dataset,
        );
        write_product(&path, &ccd.data, &header)?;
        files.push(path);
        reporter.advance(files.len());
    }
    reporter.finish_stage();
    Ok(files)
}

fn pointing(header: &Header) -> Option<SkyPosition> {
    Some(SkyPosition {
        ra: header.get_string(KEY_RA)?,
        dec: header.get_string(KEY_DEC)?,
    })
}
