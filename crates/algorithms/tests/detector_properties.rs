//! Properties of the change detectors over arbitrary inputs.

use approx::assert_relative_eq;
use landwatch_algorithms::imagery::{
    change_vector_analysis, cva_magnitude, ndvi_difference, CvaParams, NdviChangeParams,
};
use landwatch_core::BandImage;
use ndarray::Array3;
use proptest::prelude::*;

fn image_strategy(bands: usize) -> impl Strategy<Value = (usize, usize, Vec<f64>, Vec<f64>)> {
    (1usize..8, 1usize..8).prop_flat_map(move |(rows, cols)| {
        let n = bands * rows * cols;
        (
            Just(rows),
            Just(cols),
            prop::collection::vec(0.0f64..10_000.0, n),
            prop::collection::vec(0.0f64..10_000.0, n),
        )
    })
}

fn to_image(bands: usize, rows: usize, cols: usize, data: Vec<f64>) -> BandImage {
    BandImage::new(Array3::from_shape_vec((bands, rows, cols), data).unwrap())
}

proptest! {
    #[test]
    fn identical_images_have_zero_magnitude((rows, cols, data, _) in image_strategy(4)) {
        let img = to_image(4, rows, cols, data);
        let result = change_vector_analysis(&img, &img, &CvaParams { threshold: 0.0, ..CvaParams::default() }).unwrap();
        prop_assert!(result.magnitude.data().iter().all(|&m| m == 0.0));
        prop_assert_eq!(result.summary.changed_pixels, 0);
        prop_assert_eq!(result.summary.percentage_change, 0.0);
    }

    #[test]
    fn constant_offset_gives_offset_norm(
        (rows, cols, data, _) in image_strategy(4),
        offset in prop::array::uniform4(-500.0f64..500.0),
    ) {
        let before = to_image(4, rows, cols, data);
        let mut shifted = before.data().clone();
        for (band, delta) in offset.iter().enumerate() {
            shifted.index_axis_mut(ndarray::Axis(0), band).mapv_inplace(|v| v + delta);
        }
        let after = BandImage::new(shifted);
        let norm = offset.iter().map(|d| d * d).sum::<f64>().sqrt();

        let magnitude = cva_magnitude(&before, &after).unwrap();
        for &m in magnitude.data().iter() {
            prop_assert!((m - norm).abs() < 1e-6, "magnitude {} != {}", m, norm);
        }
    }

    #[test]
    fn gain_and_loss_are_disjoint(
        (rows, cols, t1, t2) in image_strategy(4),
        threshold in 1e-6f64..1.5,
    ) {
        let before = to_image(4, rows, cols, t1);
        let after = to_image(4, rows, cols, t2);
        let result = ndvi_difference(&before, &after, &NdviChangeParams::new(threshold)).unwrap();

        let overlap = result
            .gain_mask
            .data()
            .iter()
            .zip(result.loss_mask.data().iter())
            .filter(|&(&g, &l)| g == 1 && l == 1)
            .count();
        prop_assert_eq!(overlap, 0);

        let s = result.summary;
        prop_assert_eq!(s.total_change_area_ha, s.gain_area_ha + s.loss_area_ha);
        prop_assert!(s.percentage_change >= 0.0 && s.percentage_change <= 100.0);
    }
}

#[test]
fn full_vegetation_gain_scenario() {
    // (red, nir) = (100, 100) before and (50, 150) after
    let before = BandImage::constant(10, 10, &[100.0, 0.0, 0.0, 100.0]);
    let after = BandImage::constant(10, 10, &[50.0, 0.0, 0.0, 150.0]);

    let result = ndvi_difference(&before, &after, &NdviChangeParams::new(0.1)).unwrap();
    assert_eq!(result.summary.gain_pixels, 100);
    assert_eq!(result.summary.loss_pixels, 0);
    assert_relative_eq!(result.summary.gain_area_ha, 1.0);
    assert_eq!(result.summary.percentage_change, 100.0);
}

#[test]
fn identical_images_scenario() {
    let img = BandImage::constant(5, 5, &[812.0, 640.0, 455.0, 2310.0]);
    let result = change_vector_analysis(
        &img,
        &img,
        &CvaParams {
            threshold: 5.0,
            ..CvaParams::default()
        },
    )
    .unwrap();

    assert_eq!(result.summary.percentage_change, 0.0);
    assert!(result.mask.data().iter().all(|&v| v == 0));
    assert_relative_eq!(result.summary.total_area_ha, 0.25);
}
