
//! End-to-end checks of the emitted HDR containers: the files are taken
//! apart again with independent parsers (zune-jpeg, lcms2, miniz_oxide)
//! rather than trusting the writers.

use libaplpat::colorspace;
use libaplpat::gainmap::{self, GAINMAP_SCALE};
use libaplpat::models::{ColorSpaceId, Shape};
use libaplpat::pattern;
use libaplpat::png;

const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const MPF_SIGNATURE: &[u8] = b"MPF\0";

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_u32_be(bytes: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap())
}

/// Follow the MPF table out of the emitted file: returns the byte offset of
/// the byte order mark and of the secondary image, and the declared
/// secondary size.
fn locate_secondary(file: &[u8]) -> (usize, usize, u32) {
    let bom = find(file, MPF_SIGNATURE).expect("no MPF signature") + MPF_SIGNATURE.len();
    assert_eq!(&file[bom..bom + 2], b"MM");

    // MP entry block at 50 from the mark; entry 2's offset field sits at
    // entry block + 16 (entry 1) + 8 (attribute and size of entry 2).
    let entry2 = bom + 50 + 16;
    let size = read_u32_be(file, entry2 + 4);
    let offset = read_u32_be(file, entry2 + 8);
    (bom, bom + offset as usize, size)
}

fn decode_jpeg(bytes: &[u8]) -> (usize, usize) {
    let mut decoder = zune_jpeg::JpegDecoder::new(bytes);
    decoder.decode().expect("JPEG did not decode");
    let info = decoder.info().expect("no JPEG info");
    (info.width as usize, info.height as usize)
}

#[test]
fn apple_hdr_jpeg_layout() {
    let img = pattern::generate_pattern_rgb(1920, 1080, 20, Shape::Rectangle);
    let icc = colorspace::icc_profile(ColorSpaceId::Rec709).unwrap();
    let file = gainmap::apple_gainmap_jpeg(&img, 1000, Some(icc)).unwrap();

    assert_eq!(&file[..2], &[0xFF, 0xD8]);

    // One XMP APP1 on the primary image, one inside the gain map JPEG.
    assert_eq!(count_occurrences(&file, XMP_HEADER), 2);
    assert_eq!(count_occurrences(&file, MPF_SIGNATURE), 1);

    let headroom_needle = format!(
        "HDRGainMap:HDRGainMapHeadroom='{:.6}'",
        (1000.0f64 / 203.0).log2()
    );
    assert_eq!(count_occurrences(&file, headroom_needle.as_bytes()), 2);

    // MakerApple EXIF precedes the XMP.
    let exif_at = find(&file, b"Exif\0\0").expect("no EXIF APP1");
    let xmp_at = find(&file, XMP_HEADER).unwrap();
    assert!(exif_at < xmp_at);
    assert_eq!(count_occurrences(&file, b"Apple\0\0\0"), 1);

    // Seeking to the patched offset must land on the gain map's SOI, and
    // the declared size must cover exactly the rest of the file.
    let (_, secondary_start, secondary_size) = locate_secondary(&file);
    assert_eq!(&file[secondary_start..secondary_start + 2], &[0xFF, 0xD8]);
    assert_eq!(secondary_size as usize, file.len() - secondary_start);

    // Both images decode independently; the Apple gain map keeps full
    // resolution.
    assert_eq!(decode_jpeg(&file), (1920, 1080));
    let secondary = &file[secondary_start..];
    assert_eq!(decode_jpeg(secondary), (1920, 1080));
    assert!(find(secondary, b"urn:com:apple:photo:2020:aux:hdrgainmap").is_some());
}

#[test]
fn ultra_hdr_jpeg_layout() {
    let img = pattern::generate_pattern_rgb(1920, 1080, 20, Shape::Rectangle);
    let icc = colorspace::icc_profile(ColorSpaceId::Rec709).unwrap();
    let file = gainmap::ultra_hdr_jpeg(&img, 1000, Some(icc)).unwrap();

    let (_, secondary_start, secondary_size) = locate_secondary(&file);
    let secondary = &file[secondary_start..];
    assert_eq!(&secondary[..2], &[0xFF, 0xD8]);
    assert_eq!(secondary_size as usize, secondary.len());

    // The primary directory references the gain map with its exact length.
    let primary = &file[..secondary_start];
    assert!(find(primary, b"Item:Semantic='Primary' Item:Mime='image/jpeg'").is_some());
    let length_needle = format!(
        "Item:Semantic='GainMap' Item:Mime='image/jpeg' Item:Length='{}'",
        secondary.len()
    );
    assert!(find(primary, length_needle.as_bytes()).is_some());

    // Gain map metadata lives in the secondary image's XMP.
    let max_needle = format!("hdrgm:GainMapMax='{:.6}'", (1000.0f64 / 203.0).log2());
    assert!(find(secondary, max_needle.as_bytes()).is_some());
    assert!(find(secondary, b"hdrgm:BaseRenditionIsHDR='False'").is_some());

    // No MakerApple EXIF in this convention, and the gain map is
    // downsampled by 4 per axis.
    assert!(find(&file, b"Exif\0\0").is_none());
    assert_eq!(
        decode_jpeg(secondary),
        (1920 / GAINMAP_SCALE, 1080 / GAINMAP_SCALE)
    );
}

#[test]
fn pq_png_carries_the_expected_samples() {
    let img = pattern::generate_pattern_rgb(256, 256, 100, Shape::Rectangle);
    let icc = colorspace::icc_profile(ColorSpaceId::Rec2020).unwrap();
    let file = png::encode_pq_png(&img, 1000, Some(icc));

    assert_eq!(&file[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);

    // Walk the chunks, checking every CRC.
    let mut chunks = Vec::new();
    let mut pos = 8;
    while pos < file.len() {
        let length = read_u32_be(&file, pos) as usize;
        let chunk_type: [u8; 4] = file[pos + 4..pos + 8].try_into().unwrap();
        let data = &file[pos + 8..pos + 8 + length];
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&chunk_type);
        hasher.update(data);
        assert_eq!(hasher.finalize(), read_u32_be(&file, pos + 8 + length));
        chunks.push((chunk_type, data.to_vec()));
        pos += 12 + length;
    }
    let names: Vec<[u8; 4]> = chunks.iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec![*b"IHDR", *b"cICP", *b"iCCP", *b"IDAT", *b"IEND"]);

    let ihdr = &chunks[0].1;
    assert_eq!(read_u32_be(ihdr, 0), 256);
    assert_eq!(read_u32_be(ihdr, 4), 256);
    assert_eq!(ihdr[8], 16); // bit depth
    assert_eq!(ihdr[9], 2); // RGB

    assert_eq!(chunks[1].1, vec![9, 16, 0, 1]);

    // Decode the image data and probe the center pixel: the full-frame
    // white pattern must quantize to PQ(1000/10000) in all channels.
    let raw = miniz_oxide::inflate::decompress_to_vec_zlib(&chunks[3].1).unwrap();
    let stride = 1 + 256 * 6;
    assert_eq!(raw.len(), 256 * stride);
    let row = &raw[128 * stride..129 * stride];
    assert_eq!(row[0], 0); // filter: None
    let pixel = &row[1 + 128 * 6..1 + 128 * 6 + 6];
    let expected = libaplpat::transfer::pq_encode_u16(255, 1000);
    assert_eq!(expected, 49271);
    for channel in pixel.chunks_exact(2) {
        assert_eq!(u16::from_be_bytes([channel[0], channel[1]]), expected);
    }
}

#[test]
fn display_p3_profile_fields() {
    let profile = colorspace::icc_profile(ColorSpaceId::DisplayP3).unwrap();
    assert_eq!(&profile[36..40], b"acsp");
    assert_eq!(&profile[12..16], b"mntr");
    assert_eq!(&profile[16..20], b"RGB ");
    assert_eq!(&profile[20..24], b"XYZ ");
    assert!(find(profile, b"Display P3").is_some());

    let parsed = lcms2::Profile::new_icc(profile).unwrap();
    drop(parsed);
}
