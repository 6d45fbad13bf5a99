
//! XMP packet builders for the two gain-map JPEG conventions.
//!
//! Apple: `HDRGainMap` namespace on both images, plus an
//! `apdi:AuxiliaryImageType` on the gain map.
//! Ultra HDR (ISO 21496-1): `Container:Directory` on the primary image,
//! `hdrgm:` metadata on the gain map.
//! See: https://developer.android.com/media/platform/hdr-image-format

use crate::gainmap::headroom;

/// XMP for the primary image of an Apple gain-map JPEG.
pub fn apple_primary_xmp(peak_nits: u32) -> Vec<u8> {
    format!(
        concat!(
            "<?xpacket begin='\u{feff}' id='W5M0MpCehiHzreSzNTczkc9d'?>\n",
            "<x:xmpmeta xmlns:x='adobe:ns:meta/'>\n",
            "  <rdf:RDF xmlns:rdf='http://www.w3.org/1999/02/22-rdf-syntax-ns#'>\n",
            "    <rdf:Description rdf:about=''\n",
            "      xmlns:HDRGainMap='http://ns.apple.com/HDRGainMap/1.0/'\n",
            "      HDRGainMap:HDRGainMapVersion='65536'\n",
            "      HDRGainMap:HDRGainMapHeadroom='{headroom:.6}'\n",
            "    />\n",
            "  </rdf:RDF>\n",
            "</x:xmpmeta>\n",
            "<?xpacket end='w'?>",
        ),
        headroom = headroom(peak_nits),
    )
    .into_bytes()
}

/// XMP for the gain-map image of an Apple gain-map JPEG.
pub fn apple_gainmap_xmp(peak_nits: u32) -> Vec<u8> {
    format!(
        concat!(
            "<?xpacket begin='\u{feff}' id='W5M0MpCehiHzreSzNTczkc9d'?>\n",
            "<x:xmpmeta xmlns:x='adobe:ns:meta/'>\n",
            "  <rdf:RDF xmlns:rdf='http://www.w3.org/1999/02/22-rdf-syntax-ns#'>\n",
            "    <rdf:Description rdf:about=''\n",
            "      xmlns:HDRGainMap='http://ns.apple.com/HDRGainMap/1.0/'\n",
            "      xmlns:apdi='http://ns.apple.com/pixeldatainfo/1.0/'\n",
            "      apdi:AuxiliaryImageType='urn:com:apple:photo:2020:aux:hdrgainmap'\n",
            "      HDRGainMap:HDRGainMapVersion='65536'\n",
            "      HDRGainMap:HDRGainMapHeadroom='{headroom:.6}'\n",
            "    />\n",
            "  </rdf:RDF>\n",
            "</x:xmpmeta>\n",
            "<?xpacket end='w'?>",
        ),
        headroom = headroom(peak_nits),
    )
    .into_bytes()
}

/// XMP for the primary image in Ultra HDR (ISO 21496-1) format. The
/// directory lists the primary and the gain map; the gain-map entry must
/// carry the exact byte length of the secondary JPEG.
pub fn ultra_hdr_primary_xmp(gainmap_size: usize) -> Vec<u8> {
    format!(
        concat!(
            "<?xpacket begin='\u{feff}' id='W5M0MpCehiHzreSzNTczkc9d'?>\n",
            "<x:xmpmeta xmlns:x='adobe:ns:meta/'>\n",
            "  <rdf:RDF xmlns:rdf='http://www.w3.org/1999/02/22-rdf-syntax-ns#'>\n",
            "    <rdf:Description rdf:about=''\n",
            "      xmlns:hdrgm='http://ns.adobe.com/hdr-gain-map/1.0/'\n",
            "      xmlns:Container='http://ns.google.com/photos/1.0/container/'\n",
            "      xmlns:Item='http://ns.google.com/photos/1.0/container/item/'\n",
            "      hdrgm:Version='1.0'>\n",
            "      <Container:Directory>\n",
            "        <rdf:Seq>\n",
            "          <rdf:li rdf:parseType='Resource'>\n",
            "            <Container:Item Item:Semantic='Primary' Item:Mime='image/jpeg'/>\n",
            "          </rdf:li>\n",
            "          <rdf:li rdf:parseType='Resource'>\n",
            "            <Container:Item Item:Semantic='GainMap' Item:Mime='image/jpeg' Item:Length='{gainmap_size}'/>\n",
            "          </rdf:li>\n",
            "        </rdf:Seq>\n",
            "      </Container:Directory>\n",
            "    </rdf:Description>\n",
            "  </rdf:RDF>\n",
            "</x:xmpmeta>\n",
            "<?xpacket end='w'?>",
        ),
        gainmap_size = gainmap_size,
    )
    .into_bytes()
}

/// XMP for the gain-map image in Ultra HDR (ISO 21496-1) format.
pub fn ultra_hdr_gainmap_xmp(peak_nits: u32) -> Vec<u8> {
    let gain_map_max = headroom(peak_nits);
    format!(
        concat!(
            "<?xpacket begin='\u{feff}' id='W5M0MpCehiHzreSzNTczkc9d'?>\n",
            "<x:xmpmeta xmlns:x='adobe:ns:meta/'>\n",
            "  <rdf:RDF xmlns:rdf='http://www.w3.org/1999/02/22-rdf-syntax-ns#'>\n",
            "    <rdf:Description rdf:about=''\n",
            "      xmlns:hdrgm='http://ns.adobe.com/hdr-gain-map/1.0/'\n",
            "      hdrgm:Version='1.0'\n",
            "      hdrgm:GainMapMin='0.0'\n",
            "      hdrgm:GainMapMax='{gain_map_max:.6}'\n",
            "      hdrgm:Gamma='1.0'\n",
            "      hdrgm:OffsetSDR='0.015625'\n",
            "      hdrgm:OffsetHDR='0.015625'\n",
            "      hdrgm:HDRCapacityMin='0.0'\n",
            "      hdrgm:HDRCapacityMax='{gain_map_max:.6}'\n",
            "      hdrgm:BaseRenditionIsHDR='False'\n",
            "    />\n",
            "  </rdf:RDF>\n",
            "</x:xmpmeta>\n",
            "<?xpacket end='w'?>",
        ),
        gain_map_max = gain_map_max,
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description_attrs(xmp: &[u8]) -> Vec<(String, String)> {
        let text = std::str::from_utf8(xmp).unwrap();
        let body = text
            .strip_prefix("<?xpacket begin='\u{feff}' id='W5M0MpCehiHzreSzNTczkc9d'?>\n")
            .unwrap()
            .strip_suffix("<?xpacket end='w'?>")
            .unwrap();
        let doc = roxmltree::Document::parse(body).unwrap();
        let description = doc
            .descendants()
            .find(|node| node.tag_name().name() == "Description")
            .unwrap();
        description
            .attributes()
            .map(|a| (a.name().to_owned(), a.value().to_owned()))
            .collect()
    }

    #[test]
    fn packets_are_bracketed() {
        for xmp in [
            apple_primary_xmp(1000),
            apple_gainmap_xmp(1000),
            ultra_hdr_primary_xmp(1234),
            ultra_hdr_gainmap_xmp(1000),
        ] {
            assert!(xmp.starts_with(b"<?xpacket begin='\xEF\xBB\xBF'"));
            assert!(xmp.ends_with(b"<?xpacket end='w'?>"));
        }
    }

    #[test]
    fn apple_headroom_formatting() {
        let attrs = description_attrs(&apple_primary_xmp(1000));
        let headroom_value = attrs
            .iter()
            .find(|(name, _)| name == "HDRGainMapHeadroom")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert_eq!(headroom_value, format!("{:.6}", (1000.0f64 / 203.0).log2()));
        assert!(attrs.iter().any(|(n, v)| n == "HDRGainMapVersion" && v == "65536"));
    }

    #[test]
    fn apple_gainmap_declares_auxiliary_type() {
        let attrs = description_attrs(&apple_gainmap_xmp(1000));
        assert!(attrs.iter().any(|(n, v)| {
            n == "AuxiliaryImageType" && v == "urn:com:apple:photo:2020:aux:hdrgainmap"
        }));
    }

    #[test]
    fn ultra_hdr_primary_directory() {
        let xmp = ultra_hdr_primary_xmp(4321);
        let text = std::str::from_utf8(&xmp).unwrap();
        assert!(text.contains("Item:Semantic='Primary' Item:Mime='image/jpeg'"));
        assert!(text.contains("Item:Semantic='GainMap' Item:Mime='image/jpeg' Item:Length='4321'"));
    }

    #[test]
    fn ultra_hdr_gainmap_metadata() {
        let attrs = description_attrs(&ultra_hdr_gainmap_xmp(1000));
        let expected_max = format!("{:.6}", (1000.0f64 / 203.0).log2());
        for (name, value) in [
            ("Version", "1.0"),
            ("GainMapMin", "0.0"),
            ("GainMapMax", expected_max.as_str()),
            ("Gamma", "1.0"),
            ("OffsetSDR", "0.015625"),
            ("OffsetHDR", "0.015625"),
            ("HDRCapacityMin", "0.0"),
            ("HDRCapacityMax", expected_max.as_str()),
            ("BaseRenditionIsHDR", "False"),
        ] {
            assert!(
                attrs.iter().any(|(n, v)| n == name && v == value),
                "missing {name}={value}"
            );
        }
    }
}
