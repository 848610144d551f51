// tests/property_based.rs
//
// Property-based tests over the stateless API and the colorspace catalog.

use image_util::colorspace::{self, ColorspaceTable};
use image_util::engine::pipeline;
use image_util::ops::Operation;
use image_util::{
    calculate_buffer_size, convert_colorspace, crop, rotate, Colorspace, DecodeHandle,
    EncodeHandle, ImageType, ImageUtilError, OutputBuffer, Rotation,
};
use proptest::prelude::*;

fn create_test_rgb(width: u32, height: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|y| (0..width).flat_map(move |x| [(x % 256) as u8, (y % 256) as u8, 128]))
        .collect()
}

fn valid_crop_strategy() -> impl Strategy<Value = (u32, u32, u32, u32, u32, u32)> {
    (1u32..=64, 1u32..=64)
        .prop_flat_map(|(img_w, img_h)| {
            let crop_w = 1u32..=img_w;
            let crop_h = 1u32..=img_h;
            (Just(img_w), Just(img_h), crop_w, crop_h)
        })
        .prop_flat_map(|(img_w, img_h, crop_w, crop_h)| {
            let max_x = img_w - crop_w;
            let max_y = img_h - crop_h;
            (
                Just(img_w),
                Just(img_h),
                Just(crop_w),
                Just(crop_h),
                0u32..=max_x,
                0u32..=max_y,
            )
        })
}

fn invalid_crop_strategy() -> impl Strategy<Value = (u32, u32, u32, u32, u32, u32)> {
    (1u32..=64, 1u32..=64)
        .prop_flat_map(|(img_w, img_h)| {
            let crop_w = 1u32..=img_w;
            let crop_h = 1u32..=img_h;
            (Just(img_w), Just(img_h), crop_w, crop_h)
        })
        .prop_flat_map(|(img_w, img_h, crop_w, crop_h)| {
            // Push the region past the right edge by at least one pixel
            let min_x = img_w - crop_w + 1;
            (
                Just(img_w),
                Just(img_h),
                Just(crop_w),
                Just(crop_h),
                min_x..=img_w + 8,
                0u32..img_h,
            )
        })
}

fn rgb_family() -> impl Strategy<Value = Colorspace> {
    prop_oneof![
        Just(Colorspace::Rgb888),
        Just(Colorspace::Argb8888),
        Just(Colorspace::Bgra8888),
        Just(Colorspace::Rgba8888),
    ]
}

fn any_colorspace() -> impl Strategy<Value = Colorspace> {
    (0usize..Colorspace::ALL.len()).prop_map(|i| Colorspace::ALL[i])
}

proptest! {
    #[test]
    fn valid_crop_yields_requested_size((img_w, img_h, w, h, x, y) in valid_crop_strategy()) {
        let src = create_test_rgb(img_w, img_h);
        let out = crop(&src, x, y, w, h, img_w, img_h, Colorspace::Rgb888).unwrap();
        prop_assert_eq!((out.width, out.height), (w, h));
        let first = ((y * img_w + x) * 3) as usize;
        prop_assert_eq!(&out.data[..3], &src[first..first + 3]);
    }

    #[test]
    fn crop_past_edge_is_rejected((img_w, img_h, w, h, x, y) in invalid_crop_strategy()) {
        let src = create_test_rgb(img_w, img_h);
        prop_assert_eq!(
            crop(&src, x, y, w, h, img_w, img_h, Colorspace::Rgb888),
            Err(ImageUtilError::InvalidParameter)
        );
    }

    #[test]
    fn four_quarter_turns_restore_image(w in 1u32..=24, h in 1u32..=24) {
        let src = create_test_rgb(w, h);
        let mut image = (src.clone(), w, h);
        for _ in 0..4 {
            let out = rotate(&image.0, image.1, image.2, Rotation::Rotate90, Colorspace::Rgb888)
                .unwrap();
            image = (out.data, out.width, out.height);
        }
        prop_assert_eq!(image, (src, w, h));
    }

    #[test]
    fn rgb_family_round_trip_is_exact(
        w in 1u32..=16,
        h in 1u32..=16,
        middle in rgb_family(),
    ) {
        let src = create_test_rgb(w, h);
        let there = convert_colorspace(&src, w, h, Colorspace::Rgb888, middle).unwrap();
        let back = convert_colorspace(&there, w, h, middle, Colorspace::Rgb888).unwrap();
        prop_assert_eq!(back, src);
    }

    #[test]
    fn conversion_output_matches_buffer_size(
        w in 1u32..=20,
        h in 1u32..=20,
        target in any_colorspace(),
    ) {
        let src = create_test_rgb(w, h);
        let out = convert_colorspace(&src, w, h, Colorspace::Rgb888, target).unwrap();
        prop_assert_eq!(out.len(), calculate_buffer_size(w, h, target).unwrap());
    }

    #[test]
    fn pipeline_dimensions_follow_operations(
        w in 1u32..=32,
        h in 1u32..=32,
        dw in 1u32..=32,
        dh in 1u32..=32,
    ) {
        let ops = [
            Operation::Resize { width: dw, height: dh },
            Operation::Rotate { rotation: Rotation::Rotate90 },
        ];
        prop_assert_eq!(pipeline::output_dimensions(&ops, w, h), (dh, dw));
    }

    #[test]
    fn out_of_range_colorspace_is_invalid(raw in prop_oneof![i32::MIN..0, 15i32..i32::MAX]) {
        prop_assert_eq!(Colorspace::try_from(raw), Err(ImageUtilError::InvalidParameter));
    }

    #[test]
    fn foreach_stops_after_visitor_declines(limit in 1usize..=15) {
        let mut seen = Vec::new();
        colorspace::for_each_supported(ColorspaceTable::Transform, |cs| {
            seen.push(cs.as_raw());
            seen.len() < limit
        });
        prop_assert_eq!(seen.len(), limit);
        prop_assert!(seen.windows(2).all(|pair| pair[0] > pair[1]));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn decoded_size_matches_buffer_size(w in 1u32..=40, h in 1u32..=40) {
        let rgba: Vec<u8> = (0..w * h).flat_map(|i| [(i % 251) as u8, 7, 200, 255]).collect();
        let encoded = OutputBuffer::new();
        let mut encoder = EncodeHandle::create(ImageType::Png).unwrap();
        encoder.set_resolution(w, h).unwrap();
        encoder.set_input_buffer(rgba.clone()).unwrap();
        encoder.set_output_buffer(encoded.clone()).unwrap();
        encoder.run().unwrap();

        let decoded = OutputBuffer::new();
        let mut decoder = DecodeHandle::create().unwrap();
        decoder.set_input_buffer(encoded.take().unwrap()).unwrap();
        decoder.set_output_buffer(decoded.clone()).unwrap();
        let info = decoder.run().unwrap();
        prop_assert_eq!(info.size, calculate_buffer_size(w, h, Colorspace::Rgba8888).unwrap());
        prop_assert_eq!(decoded.take().unwrap(), rgba);
    }

    #[test]
    fn unsupported_jpeg_colorspaces_are_rejected(cs in any_colorspace()) {
        let mut handle = EncodeHandle::create(ImageType::Jpeg).unwrap();
        let result = handle.set_colorspace(cs);
        if colorspace::is_supported(cs, ImageType::Jpeg) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(result, Err(ImageUtilError::NotSupportedFormat));
        }
    }
}
