use approx::assert_relative_eq;
use ndarray::Array2;

use imred_core::frame::SkyPosition;
use imred_core::header::Header;
use imred_core::wcs::{
    object_designation, parse_sexagesimal, CelestialSolution, LinearWavelengthSolution,
    SkyCoordinate,
};

#[test]
fn test_linear_solution_centered_on_range() {
    let wcs = LinearWavelengthSolution::new((40, 101), 4000.0, 5000.0).unwrap();
    assert_relative_eq!(wcs.cdelt[0], 10.0);
    assert_relative_eq!(wcs.crpix[0], 50.5);
    assert_relative_eq!(wcs.crval[0], 4500.0);
    assert_relative_eq!(wcs.crpix[1], 20.0);
    assert_relative_eq!(wcs.crval[1], 20.0);
    assert_relative_eq!(wcs.cdelt[1], 1.0);
    assert_relative_eq!(wcs.wavelength_at(60.5), 4600.0);
}

#[test]
fn test_descending_range_gives_negative_dispersion() {
    let wcs = LinearWavelengthSolution::new((10, 11), 7000.0, 6000.0).unwrap();
    assert_relative_eq!(wcs.cdelt[0], -100.0);
}

#[test]
fn test_linear_solution_cards() {
    let wcs = LinearWavelengthSolution::new((40, 101), 4000.0, 5000.0).unwrap();
    let mut header = Header::new();
    wcs.write_cards(&mut header);
    assert_eq!(header.get_int("WCSAXES"), Some(2));
    assert_eq!(header.get_string("CTYPE1").as_deref(), Some("LINEAR"));
    assert_eq!(header.get_string("CTYPE2").as_deref(), Some("PIXEL"));
    assert_relative_eq!(header.get_float("CDELT1").unwrap(), 10.0);
    assert_relative_eq!(header.get_float("CRVAL1").unwrap(), 4500.0);
    assert_relative_eq!(header.get_float("CRPIX2").unwrap(), 20.0);
}

#[test]
fn test_linear_solution_rejects_degenerate_input() {
    assert!(LinearWavelengthSolution::new((10, 1), 4000.0, 5000.0).is_err());
    assert!(LinearWavelengthSolution::new((10, 100), 4000.0, 4000.0).is_err());
    assert!(LinearWavelengthSolution::new((10, 100), f64::NAN, 5000.0).is_err());
}

#[test]
fn test_pointing_to_degrees() {
    let position = SkyPosition {
        ra: "12:34:56.7".into(),
        dec: "-45:12:33".into(),
    };
    let coord = position.to_degrees().unwrap();
    assert_relative_eq!(coord.ra_deg, 188.73625, epsilon = 1e-9);
    assert_relative_eq!(coord.dec_deg, -45.209166666666667, epsilon = 1e-9);

    let out_of_range = SkyPosition {
        ra: "25:00:00".into(),
        dec: "00:00:00".into(),
    };
    assert!(out_of_range.to_degrees().is_err());
}

#[test]
fn test_sexagesimal_separators() {
    assert_relative_eq!(parse_sexagesimal("+10 30 00").unwrap(), 10.5);
    assert_relative_eq!(parse_sexagesimal("10:30").unwrap(), 10.5);
    assert_relative_eq!(parse_sexagesimal("7").unwrap(), 7.0);
    assert!(parse_sexagesimal("1:2:3:4").is_err());
}

#[test]
fn test_designation_from_pointing() {
    let mut header = Header::new();
    header.set("RA", "12:34:56.7");
    header.set("DEC", "-45:12:33");
    assert_eq!(object_designation(&header).as_deref(), Some("J1234-4512"));

    header.set("DEC", "+05:01:02");
    assert_eq!(object_designation(&header).as_deref(), Some("J1234+0501"));

    header.remove("RA");
    assert_eq!(object_designation(&header), None);
}

#[test]
fn test_celestial_solution_cards() {
    let solution = CelestialSolution {
        crpix: [1024.5, 2048.5],
        crval: SkyCoordinate {
            ra_deg: 188.5,
            dec_deg: -45.25,
        },
        cd: [[-5.0e-5, 0.0], [0.0, 5.0e-5]],
    };
    let mut header = Header::new();
    solution.write_cards(&mut header);
    assert_eq!(header.get_string("CTYPE1").as_deref(), Some("RA---TAN"));
    assert_eq!(header.get_string("CTYPE2").as_deref(), Some("DEC--TAN"));
    assert_relative_eq!(header.get_float("CRVAL1").unwrap(), 188.5);
    assert_relative_eq!(header.get_float("CRVAL2").unwrap(), -45.25);
    assert_relative_eq!(header.get_float("CD1_1").unwrap(), -5.0e-5);
    assert_relative_eq!(header.get_float("CD2_2").unwrap(), 5.0e-5);
    assert_relative_eq!(header.get_float("CD1_2").unwrap(), 0.0);
}

#[test]
fn test_plate_solver_is_object_safe() {
    struct Fixed;
    impl imred_core::wcs::PlateSolver for Fixed {
        fn solve(
            &self,
            image: &Array2<f32>,
            approx: Option<SkyCoordinate>,
        ) -> imred_core::error::Result<CelestialSolution> {
            let center = approx.unwrap_or(SkyCoordinate {
                ra_deg: 0.0,
                dec_deg: 0.0,
            });
            Ok(CelestialSolution {
                crpix: [image.ncols() as f64 / 2.0, image.nrows() as f64 / 2.0],
                crval: center,
                cd: [[1.0e-4, 0.0], [0.0, 1.0e-4]],
            })
        }
    }

    let solver: Box<dyn imred_core::wcs::PlateSolver> = Box::new(Fixed);
    let solution = solver.solve(&Array2::zeros((4, 6)), None).unwrap();
    assert_eq!(solution.crpix, [3.0, 2.0]);
}
