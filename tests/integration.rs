use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use photo_watermark::layout::{BarGeometry, BarLayout, Palette};
use photo_watermark::{
    wgs84_to_gcj02, EncodedImage, Error, FontSpec, ImageSource, LocationFix, RasterSurface,
    Surface, Viewport, WatermarkCompositor, WatermarkInfo, WatermarkStyle,
};

const PHOTO_COLOR: [u8; 4] = [200, 180, 160, 255];

fn photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(PHOTO_COLOR)))
}

fn photo_data_uri(width: u32, height: u32) -> String {
    let mut png = Cursor::new(Vec::new());
    photo(width, height)
        .write_to(&mut png, ImageFormat::Png)
        .unwrap();
    EncodedImage {
        bytes: png.into_inner(),
        mime: "image/png",
    }
    .to_data_uri()
}

fn sample_info() -> WatermarkInfo {
    WatermarkInfo {
        time: Some("2024-01-15 14:30:00".to_string()),
        lat: Some(39.9),
        lng: Some(116.4),
        name: Some("张三".to_string()),
        company: Some("某某科技有限公司".to_string()),
        address: None,
    }
}

fn phone() -> WatermarkCompositor {
    WatermarkCompositor::new().with_viewport(Viewport::new(375, 667, 2.0))
}

fn close(a: Rgba<u8>, b: [u8; 3], tolerance: i16) -> bool {
    (0..3).all(|i| (i16::from(a[i]) - i16::from(b[i])).abs() <= tolerance)
}

#[test]
fn reference_point_converts_to_known_gcj02() {
    let p = wgs84_to_gcj02(39.9, 116.4);
    assert!((p.latitude - 39.901_403_529_849_404).abs() < 1e-6);
    assert!((p.longitude - 116.406_242_784_911_17).abs() < 1e-6);

    let drift_lat = (p.latitude - 39.9).abs();
    let drift_lng = (p.longitude - 116.4).abs();
    assert!(drift_lat > 0.0 && drift_lat < 0.01);
    assert!(drift_lng > 0.0 && drift_lng < 0.01);
}

#[test]
fn conversion_is_bit_identical_across_calls() {
    let a = wgs84_to_gcj02(31.2304, 121.4737);
    let b = wgs84_to_gcj02(31.2304, 121.4737);
    assert_eq!(a.latitude.to_bits(), b.latitude.to_bits());
    assert_eq!(a.longitude.to_bits(), b.longitude.to_bits());
}

#[test]
fn phone_viewport_end_to_end() {
    let source = ImageSource::from_src(&photo_data_uri(1080, 1920));
    let encoded = phone()
        .composite(&source, &sample_info(), &WatermarkStyle::default())
        .unwrap();

    assert!(encoded
        .to_data_uri()
        .starts_with("data:image/jpeg;base64,"));

    let out = image::load_from_memory(&encoded.bytes).unwrap();
    assert_eq!(out.dimensions(), (750, 1334));

    // Above the bar the photo is untouched.
    assert!(close(out.get_pixel(10, 200), [200, 180, 160], 8));
    // Inside the bar, clear of any text, the 50% black fill halves the photo.
    assert!(close(out.get_pixel(40, 1200), [100, 90, 80], 10));
    // Below the bar, 36 logical units of photo remain.
    assert!(close(out.get_pixel(375, 1320), [200, 180, 160], 8));
}

#[test]
fn composite_is_idempotent() {
    let source = ImageSource::Image(photo(540, 960));
    let compositor = phone();
    let style = WatermarkStyle::default();

    let first = compositor.composite(&source, &sample_info(), &style).unwrap();
    let second = compositor.composite(&source, &sample_info(), &style).unwrap();
    assert_eq!(first, second);
}

#[test]
fn viewport_defaults_to_the_source_size() {
    let encoded = WatermarkCompositor::new()
        .composite(
            &ImageSource::Image(photo(400, 300)),
            &WatermarkInfo::default(),
            &WatermarkStyle::default(),
        )
        .unwrap();
    let out = image::load_from_memory(&encoded.bytes).unwrap();
    assert_eq!(out.dimensions(), (400, 300));
}

#[test]
fn undecodable_source_fails_with_image_load() {
    for source in [
        ImageSource::from_src("data:image/png;base64,AAAA"),
        ImageSource::from_src("/definitely/missing/photo.jpg"),
    ] {
        let result = phone().composite(&source, &sample_info(), &WatermarkStyle::default());
        assert!(matches!(result, Err(Error::ImageLoad(_))), "{source:?}");
    }
}

#[test]
fn zero_sized_viewport_is_surface_unavailable() {
    let result = WatermarkCompositor::new()
        .with_viewport(Viewport::new(0, 667, 2.0))
        .composite(
            &ImageSource::Image(photo(10, 10)),
            &sample_info(),
            &WatermarkStyle::default(),
        );
    assert!(matches!(
        result,
        Err(Error::SurfaceUnavailable {
            width: 0,
            height: 1334
        })
    ));
}

#[test]
fn truncation_holds_with_real_font_metrics() {
    let surface = RasterSurface::new(8, 8).unwrap();
    let style = WatermarkStyle::default();
    let info = WatermarkInfo {
        company: Some("Shenzhen Example Technology Development Company Limited".to_string()),
        address: Some("Floor 20, Building 10, Shenzhen Bay Eco-Tech Park, Nanshan District".to_string()),
        lat: Some(22.54),
        lng: Some(114.06),
        ..WatermarkInfo::default()
    };
    let geometry = BarGeometry::new(375.0, 667.0, style.bar_height);
    let layout = BarLayout::plan(
        geometry,
        &info,
        &style,
        Palette::from_style(&style),
        |text, font| surface.measure_text(text, font),
    );

    let company_y = geometry.bar.y + 16.0 + 24.0;
    let address_top = geometry.bar.y + 16.0 + 64.0;
    let mut address_lines = 0;
    for (text, _, y, font) in layout.texts() {
        let width = surface.measure_text(text, font);
        if (y - company_y).abs() < 1e-3 {
            assert!(text.ends_with("..."));
            assert!(width <= geometry.company_max_width());
        } else if y >= address_top - 1e-3 {
            assert_eq!(font, FontSpec::regular(14.0));
            assert!(width <= geometry.address_max_width());
            address_lines += 1;
        }
    }
    assert!(address_lines >= 2);
}

#[test]
fn location_fix_flows_into_the_bar() {
    let fix = LocationFix::wgs84(22.5431, 114.0579).with_address("深圳市福田区");
    let info = WatermarkInfo::default().with_location(&fix);
    assert!((info.lat.unwrap() - 22.540_382_814_222_46).abs() < 1e-6);
    assert!((info.lng.unwrap() - 114.063_013_998_565_47).abs() < 1e-6);
    assert_eq!(info.address.as_deref(), Some("深圳市福田区"));

    let already_corrected = LocationFix::gcj02(22.5, 114.0);
    let info = WatermarkInfo::default().with_location(&already_corrected);
    assert_eq!((info.lat, info.lng), (Some(22.5), Some(114.0)));
}

#[test]
fn info_and_style_load_from_camel_case_json() {
    let info: WatermarkInfo = serde_json::from_str(
        r#"{"time":"2024-01-15 14:30:00","lat":39.9,"lng":116.4,"name":"张三"}"#,
    )
    .unwrap();
    assert_eq!(info.name.as_deref(), Some("张三"));
    assert!(info.company.is_none());

    let style: WatermarkStyle =
        serde_json::from_str(r##"{"showCompany":false,"barHeight":120,"textColor":"#ff0"}"##)
            .unwrap();
    assert!(!style.show_company);
    assert!(style.show_time);
    assert!((style.bar_height - 120.0).abs() < f32::EPSILON);
    assert_eq!(style.text_color, "#ff0");
    assert!((style.font_size - 14.0).abs() < f32::EPSILON);
}

#[test]
fn process_directory_stamps_supported_files_only() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    photo(64, 48).save(input.path().join("a.png")).unwrap();
    photo(48, 64).to_rgb8().save(input.path().join("b.jpg")).unwrap();
    std::fs::write(input.path().join("notes.txt"), "not an image").unwrap();

    let results = WatermarkCompositor::new().process_directory(
        input.path(),
        output.path(),
        &sample_info(),
        &WatermarkStyle::default(),
    );

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success), "{results:?}");
    let a = image::open(output.path().join("a.jpg")).unwrap();
    assert_eq!(a.dimensions(), (64, 48));
    assert!(output.path().join("b.jpg").exists());
    assert!(!output.path().join("notes.jpg").exists());
}

#[test]
fn process_directory_keeps_inputs_with_shared_stem_apart() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    photo(64, 48).save(input.path().join("photo.png")).unwrap();
    photo(48, 64).to_rgb8().save(input.path().join("photo.jpg")).unwrap();

    let results = WatermarkCompositor::new().process_directory(
        input.path(),
        output.path(),
        &sample_info(),
        &WatermarkStyle::default(),
    );

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success), "{results:?}");
    let outputs: std::collections::HashSet<_> =
        results.iter().filter_map(|r| r.output.clone()).collect();
    assert_eq!(outputs.len(), 2);

    let written = std::fs::read_dir(output.path()).unwrap().count();
    assert_eq!(written, 2);
    let from_png = image::open(output.path().join("photo_png.jpg")).unwrap();
    let from_jpg = image::open(output.path().join("photo_jpg.jpg")).unwrap();
    assert_eq!(from_png.dimensions(), (64, 48));
    assert_eq!(from_jpg.dimensions(), (48, 64));
}

#[test]
fn process_file_refuses_non_jpeg_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    photo(32, 32).save(&input).unwrap();

    let result = WatermarkCompositor::new().process_file(
        &input,
        &dir.path().join("out.png"),
        &sample_info(),
        &WatermarkStyle::default(),
    );
    assert!(!result.success);
    assert!(result.output.is_none());
    assert!(result.message.contains("unsupported image format"));
}

#[cfg(feature = "async")]
#[tokio::test]
async fn composite_async_matches_blocking_composite() {
    let compositor = phone();
    let source = ImageSource::Image(photo(300, 400));
    let style = WatermarkStyle::default();

    let blocking = compositor
        .composite(&source, &sample_info(), &style)
        .unwrap();
    let asynchronous = compositor
        .composite_async(source, sample_info(), style)
        .await
        .unwrap();
    assert_eq!(blocking, asynchronous);
}
