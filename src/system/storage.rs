// EEPROM-style byte storage on top of a single NVS blob
//
// The baseline store addresses storage by byte offset and commits
// explicitly. NVS stores key/value blobs, so the whole region is kept as one
// RAM image and written back as a single blob on commit.

/// Size of the emulated EEPROM region
pub const EEPROM_SIZE: usize = 64;

use core::fmt::Debug;
use thiserror::Error;

const ERASED: u8 = 0xFF;

#[derive(Error, Debug)]
pub enum EepromError<E: Debug> {
    #[error("{len} bytes at {address} exceed the EEPROM region")]
    OutOfRange { address: usize, len: usize },
    #[error("NVS backend failed: {0:?}")]
    Backend(E),
}

/// RAM copy of the EEPROM region
#[derive(Debug, Clone, PartialEq)]
pub struct EepromImage {
    bytes: Vec<u8>,
}

impl EepromImage {
    pub fn erased(size: usize) -> Self {
        Self {
            bytes: vec![ERASED; size],
        }
    }

    /// Image from a stored blob; short blobs are padded as erased, long ones cut
    pub fn from_blob(blob: &[u8], size: usize) -> Self {
        let mut image = Self::erased(size);
        let len = blob.len().min(size);
        image.bytes[..len].copy_from_slice(&blob[..len]);
        image
    }

    pub fn read<E: Debug>(&self, address: usize, buf: &mut [u8]) -> Result<(), EepromError<E>> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    /// Returns true when the image changed
    pub fn write<E: Debug>(&mut self, address: usize, data: &[u8]) -> Result<bool, EepromError<E>> {
        let range = self.range(address, data.len())?;
        if self.bytes[range.clone()] == *data {
            return Ok(false);
        }
        self.bytes[range].copy_from_slice(data);
        Ok(true)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range<E: Debug>(&self, address: usize, len: usize) -> Result<core::ops::Range<usize>, EepromError<E>> {
        match address.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(address..end),
            _ => Err(EepromError::OutOfRange { address, len }),
        }
    }
}

#[cfg(target_os = "espidf")]
mod nvs {
    use super::*;
    use battery_core::hal::NvStorage;
    use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
    use esp_idf_sys::EspError;

    const EEPROM_KEY: &str = "eeprom";

    /// Initialize NVS flash, erasing it when the layout is unusable
    pub fn ensure_nvs_ready() {
        unsafe {
            let init_res = esp_idf_sys::nvs_flash_init();
            if init_res == esp_idf_sys::ESP_ERR_NVS_NO_FREE_PAGES as i32
                || init_res == esp_idf_sys::ESP_ERR_NVS_NEW_VERSION_FOUND as i32
            {
                log::warn!("NVS partition unusable ({}), erasing", init_res);
                let _ = esp_idf_sys::nvs_flash_erase();
                let _ = esp_idf_sys::nvs_flash_init();
            }
        }
    }

    pub struct NvsEeprom {
        nvs: EspNvs<NvsDefault>,
        image: EepromImage,
        dirty: bool,
    }

    impl NvsEeprom {
        pub fn new(partition: &EspDefaultNvsPartition, namespace: &str) -> Result<Self, EspError> {
            let nvs = EspNvs::new(partition.clone(), namespace, true)?;

            let mut buf = [0u8; EEPROM_SIZE];
            let image = match nvs.get_blob(EEPROM_KEY, &mut buf) {
                Ok(Some(blob)) => EepromImage::from_blob(blob, EEPROM_SIZE),
                Ok(None) => {
                    log::info!("No EEPROM image in NVS, starting erased");
                    EepromImage::erased(EEPROM_SIZE)
                }
                Err(e) => {
                    log::warn!("Failed to read EEPROM image: {:?}, starting erased", e);
                    EepromImage::erased(EEPROM_SIZE)
                }
            };

            Ok(Self {
                nvs,
                image,
                dirty: false,
            })
        }
    }

    impl NvStorage for NvsEeprom {
        type Error = EepromError<EspError>;

        fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
            self.image.read(address, buf)
        }

        fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error> {
            if self.image.write(address, data)? {
                self.dirty = true;
            }
            Ok(())
        }

        fn commit(&mut self) -> Result<(), Self::Error> {
            if !self.dirty {
                return Ok(());
            }
            self.nvs
                .set_blob(EEPROM_KEY, self.image.as_bytes())
                .map_err(EepromError::Backend)?;
            self.dirty = false;
            Ok(())
        }
    }
}

#[cfg(target_os = "espidf")]
pub use nvs::{ensure_nvs_ready, NvsEeprom};
