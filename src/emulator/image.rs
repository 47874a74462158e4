//! Decoding of LC-3 object images: a big-endian origin followed by big-endian words.
use crate::errors::LoadProgramError;

/// A decoded image, ready to be copied into memory at `origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub origin: u16,
    pub words: Vec<u16>,
}

impl TryFrom<&[u8]> for Image {
    type Error = LoadProgramError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < 2 {
            return Err(LoadProgramError::ProgramMissingOrigHeader);
        }
        if bytes.len() % 2 != 0 {
            return Err(LoadProgramError::ProgramNotWordAligned {
                byte_count: bytes.len(),
            });
        }
        let mut words = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        let origin = words.next().ok_or(LoadProgramError::ProgramMissingOrigHeader)?;
        Ok(Self {
            origin,
            words: words.collect(),
        })
    }
}

impl TryFrom<&[u16]> for Image {
    type Error = LoadProgramError;

    /// Words with the origin as first element, already in host byte order.
    fn try_from(program: &[u16]) -> Result<Self, Self::Error> {
        let (origin, rest) = program
            .split_first()
            .ok_or(LoadProgramError::ProgramMissingOrigHeader)?;
        Ok(Self {
            origin: *origin,
            words: rest.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_image_from_big_endian_bytes() {
        let bytes: &[u8] = &[0x30, 0x00, 0xF0, 0x25, 0x12, 0x34];
        let image = Image::try_from(bytes).unwrap();
        expect_that!(image.origin, eq(0x3000));
        expect_that!(image.words, eq(&vec![0xF025u16, 0x1234]));
    }
    #[gtest]
    fn test_image_only_origin() {
        let bytes: &[u8] = &[0x40, 0x00];
        let image = Image::try_from(bytes).unwrap();
        expect_that!(image.origin, eq(0x4000));
        expect_that!(image.words, is_empty());
    }
    #[gtest]
    fn test_image_empty() {
        let bytes: &[u8] = &[];
        expect_that!(
            Image::try_from(bytes).unwrap_err(),
            eq(&LoadProgramError::ProgramMissingOrigHeader)
        );
        let words: &[u16] = &[];
        expect_that!(
            Image::try_from(words).unwrap_err(),
            eq(&LoadProgramError::ProgramMissingOrigHeader)
        );
    }
    #[gtest]
    fn test_image_odd_length() {
        let bytes: &[u8] = &[0x30, 0x00, 0xF0];
        assert_that!(
            Image::try_from(bytes).unwrap_err().to_string(),
            eq("Program has an odd number of 3 bytes and cannot be read as u16 words")
        );
    }
}
