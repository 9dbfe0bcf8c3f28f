use super::*;

fn checkerboard() -> Image {
    let res = Resolution::new(16, 8);
    let data = (0..res.num_pixels())
        .flat_map(|i| {
            let (x, y) = (i % 16, i / 16);
            if (x / 4 + y / 4) % 2 == 0 {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        })
        .collect::<Vec<_>>();
    Image::from_rgba8(res, &data)
}

#[test]
fn jpeg_encoding() {
    let image = checkerboard();
    let jpeg = image.encode_jpeg(DEFAULT_JPEG_QUALITY).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing SOI marker");

    let decoded = Image::decode_jpeg(&jpeg).unwrap();
    assert_eq!(decoded.resolution(), image.resolution());
    // Lossy, but the blocks are large enough to survive.
    assert!(decoded.get(1, 1)[0] > 200);
    assert!(decoded.get(5, 1)[0] < 50);
}

#[test]
fn format_from_path() {
    assert_eq!(
        ImageFormat::from_path("a/photo.JPG".as_ref()).unwrap(),
        ImageFormat::Jpeg
    );
    assert_eq!(
        ImageFormat::from_path("x.png".as_ref()).unwrap().mime_type(),
        "image/png"
    );
    assert!(ImageFormat::from_path("x.gif".as_ref()).is_err());
    assert!(ImageFormat::from_path("noext".as_ref()).is_err());
}

#[test]
fn fill_and_flip() {
    let mut image = Image::new(3, 1);
    image.fill([1, 2, 3, 4]);
    assert_eq!(image.get(2, 0), [1, 2, 3, 4]);

    let mut image = checkerboard();
    let before = image.get(0, 0);
    image.flip_horizontal_in_place();
    assert_eq!(image.get(15, 0), before);
}

#[test]
fn save_and_load() {
    let dir = std::env::temp_dir().join(format!("handcheck-image-{}", fastrand::u64(..)));
    std::fs::create_dir_all(&dir).unwrap();

    let image = checkerboard();
    let png = dir.join("board.png");
    image.save(&png).unwrap();
    let loaded = Image::load(&png).unwrap();
    assert_eq!(loaded.resolution(), image.resolution());
    assert_eq!(loaded.data(), image.data(), "PNG is lossless");

    let jpg = dir.join("board.JPG");
    image.save(&jpg).unwrap();
    assert_eq!(Image::load(&jpg).unwrap().resolution(), image.resolution());

    assert!(Image::load(dir.join("missing.png")).is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
#[should_panic(expected = "incorrect buffer size")]
fn from_rgba8_checks_size() {
    Image::from_rgba8(Resolution::new(2, 2), &[0; 15]);
}
