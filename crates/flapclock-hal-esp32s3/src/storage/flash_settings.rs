use embedded_storage::{ReadStorage, Storage};
use esp_bootloader_esp_idf::partitions::{
    DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType, read_partition_table,
};
use esp_rom_sys::rom::spiflash::{
    ESP_ROM_SPIFLASH_RESULT_OK, esp_rom_spiflash_erase_sector, esp_rom_spiflash_read,
    esp_rom_spiflash_unlock, esp_rom_spiflash_write,
};
use flapclock_core::{
    schedule::ScheduleWindow,
    settings::{
        PASSWORD_MAX_BYTES, PersistedSettings, SSID_MAX_BYTES, SettingsStore, WifiCredentials,
    },
};

const FLASH_SECTOR_SIZE: u32 = 4096;
const DEFAULT_FLASH_CAPACITY_BYTES: usize = 16 * 1024 * 1024;

const SETTINGS_MAGIC: u32 = 0x3143_4653; // "SFC1"
const SETTINGS_VERSION: u8 = 1;

const FLAG_CREDENTIALS: u8 = 0x01;

const OFFSET_FLAGS: usize = 5;
const OFFSET_SLEEP_START: usize = 6;
const OFFSET_SLEEP_END: usize = 7;
const OFFSET_DATE_INTERVAL: usize = 8;
const OFFSET_SSID_LEN: usize = 9;
const OFFSET_SSID: usize = 10;
const OFFSET_PASSWORD_LEN: usize = OFFSET_SSID + SSID_MAX_BYTES;
const OFFSET_PASSWORD: usize = OFFSET_PASSWORD_LEN + 1;
const OFFSET_CHECKSUM: usize = OFFSET_PASSWORD + PASSWORD_MAX_BYTES;
const SETTINGS_RECORD_LEN: usize = OFFSET_CHECKSUM + 4;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlashSettingsError {
    PartitionTable,
    SettingsPartitionMissing,
    PartitionTooSmall,
    FlashOpFailed(i32),
    Corrupted,
    Unsupported,
}

/// Word-granular access to the SPI flash through the ROM routines.
#[derive(Debug)]
struct RawFlash;

impl RawFlash {
    fn new() -> Result<Self, FlashSettingsError> {
        let rc = unsafe { esp_rom_spiflash_unlock() };
        check(rc)?;
        Ok(Self)
    }

    fn erase_sector(&mut self, sector_addr: u32) -> Result<(), FlashSettingsError> {
        if !sector_addr.is_multiple_of(FLASH_SECTOR_SIZE) {
            return Err(FlashSettingsError::Unsupported);
        }
        let rc = unsafe { esp_rom_spiflash_erase_sector(sector_addr / FLASH_SECTOR_SIZE) };
        check(rc)
    }

    fn read_word(&mut self, addr: u32) -> Result<[u8; 4], FlashSettingsError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashSettingsError::Unsupported);
        }

        let mut word = 0u32;
        let rc = unsafe { esp_rom_spiflash_read(addr, &mut word as *mut u32 as *const u32, 4) };
        check(rc)?;
        Ok(word.to_le_bytes())
    }

    fn write_word(&mut self, addr: u32, bytes: [u8; 4]) -> Result<(), FlashSettingsError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashSettingsError::Unsupported);
        }

        let word = u32::from_le_bytes(bytes);
        let rc = unsafe { esp_rom_spiflash_write(addr, &word as *const u32, 4) };
        check(rc)
    }

    /// Reads `out.len()` bytes starting at any address.
    fn read_bytes(&mut self, addr: u32, out: &mut [u8]) -> Result<(), FlashSettingsError> {
        let mut skip = (addr % 4) as usize;
        let mut word_addr = addr - skip as u32;
        let mut filled = 0usize;

        while filled < out.len() {
            let bytes = self.read_word(word_addr)?;
            let take = (4 - skip).min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&bytes[skip..skip + take]);
            filled += take;
            skip = 0;
            word_addr += 4;
        }
        Ok(())
    }

    /// Programs `data` into an erased region. Bytes sharing a word with
    /// `data` but outside it are written as 0xFF, which leaves them untouched.
    fn write_erased_bytes(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashSettingsError> {
        let mut skip = (addr % 4) as usize;
        let mut word_addr = addr - skip as u32;
        let mut consumed = 0usize;

        while consumed < data.len() {
            let mut bytes = [0xFFu8; 4];
            let take = (4 - skip).min(data.len() - consumed);
            bytes[skip..skip + take].copy_from_slice(&data[consumed..consumed + take]);
            self.write_word(word_addr, bytes)?;
            consumed += take;
            skip = 0;
            word_addr += 4;
        }
        Ok(())
    }
}

impl ReadStorage for RawFlash {
    type Error = FlashSettingsError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.read_bytes(offset, bytes)
    }

    fn capacity(&self) -> usize {
        DEFAULT_FLASH_CAPACITY_BYTES
    }
}

// The partition reader only needs ReadStorage, but its API takes Storage.
impl Storage for RawFlash {
    fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
        Err(FlashSettingsError::Unsupported)
    }
}

/// Settings record in the last sector of the first writable data partition.
#[derive(Debug)]
pub struct FlashSettingsStore {
    flash: RawFlash,
    settings_sector_addr: u32,
}

impl FlashSettingsStore {
    pub fn new() -> Result<Self, FlashSettingsError> {
        let mut flash = RawFlash::new()?;

        let mut table_buf = [0u8; PARTITION_TABLE_MAX_LEN];
        let table = read_partition_table(&mut flash, &mut table_buf)
            .map_err(|_| FlashSettingsError::PartitionTable)?;

        let mut data_undefined: Option<(u32, u32)> = None;
        let mut fallback_nvs: Option<(u32, u32)> = None;

        for entry in table.iter() {
            if entry.is_read_only() {
                continue;
            }

            match entry.partition_type() {
                PartitionType::Data(DataPartitionSubType::Undefined) => {
                    data_undefined = Some((entry.offset(), entry.len()));
                    break;
                }
                PartitionType::Data(DataPartitionSubType::Nvs) if fallback_nvs.is_none() => {
                    fallback_nvs = Some((entry.offset(), entry.len()));
                }
                _ => {}
            }
        }

        let (offset, len) = data_undefined
            .or(fallback_nvs)
            .ok_or(FlashSettingsError::SettingsPartitionMissing)?;

        if len < FLASH_SECTOR_SIZE {
            return Err(FlashSettingsError::PartitionTooSmall);
        }

        Ok(Self {
            flash,
            settings_sector_addr: offset + len - FLASH_SECTOR_SIZE,
        })
    }
}

impl SettingsStore for FlashSettingsStore {
    type Error = FlashSettingsError;

    fn load(&mut self) -> Result<Option<PersistedSettings>, Self::Error> {
        let mut buf = [0u8; SETTINGS_RECORD_LEN];
        self.flash.read_bytes(self.settings_sector_addr, &mut buf)?;
        decode_record(&buf)
    }

    fn save(&mut self, settings: &PersistedSettings) -> Result<(), Self::Error> {
        let buf = encode_record(settings);
        self.flash.erase_sector(self.settings_sector_addr)?;
        self.flash
            .write_erased_bytes(self.settings_sector_addr, &buf)
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.flash.erase_sector(self.settings_sector_addr)
    }
}

fn encode_record(settings: &PersistedSettings) -> [u8; SETTINGS_RECORD_LEN] {
    let mut buf = [0u8; SETTINGS_RECORD_LEN];
    buf[0..4].copy_from_slice(&SETTINGS_MAGIC.to_le_bytes());
    buf[4] = SETTINGS_VERSION;
    buf[OFFSET_SLEEP_START] = settings.window.sleep_start_hour;
    buf[OFFSET_SLEEP_END] = settings.window.sleep_end_hour;
    buf[OFFSET_DATE_INTERVAL] = settings.window.date_display_interval_minutes;

    if let Some(credentials) = &settings.credentials {
        buf[OFFSET_FLAGS] |= FLAG_CREDENTIALS;

        let ssid = credentials.ssid.as_bytes();
        buf[OFFSET_SSID_LEN] = ssid.len() as u8;
        buf[OFFSET_SSID..OFFSET_SSID + ssid.len()].copy_from_slice(ssid);

        let password = credentials.password.as_bytes();
        buf[OFFSET_PASSWORD_LEN] = password.len() as u8;
        buf[OFFSET_PASSWORD..OFFSET_PASSWORD + password.len()].copy_from_slice(password);
    }

    let checksum = checksum32(&buf[..OFFSET_CHECKSUM]);
    buf[OFFSET_CHECKSUM..].copy_from_slice(&checksum.to_le_bytes());
    buf
}

fn decode_record(
    buf: &[u8; SETTINGS_RECORD_LEN],
) -> Result<Option<PersistedSettings>, FlashSettingsError> {
    if buf.iter().all(|b| *b == 0xFF) {
        return Ok(None);
    }

    let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != SETTINGS_MAGIC || buf[4] != SETTINGS_VERSION {
        return Ok(None);
    }

    let expected = u32::from_le_bytes([
        buf[OFFSET_CHECKSUM],
        buf[OFFSET_CHECKSUM + 1],
        buf[OFFSET_CHECKSUM + 2],
        buf[OFFSET_CHECKSUM + 3],
    ]);
    if checksum32(&buf[..OFFSET_CHECKSUM]) != expected {
        return Err(FlashSettingsError::Corrupted);
    }

    let window = ScheduleWindow::validated(
        buf[OFFSET_SLEEP_START],
        buf[OFFSET_SLEEP_END],
        buf[OFFSET_DATE_INTERVAL],
    )
    .map_err(|_| FlashSettingsError::Corrupted)?;

    let credentials = if buf[OFFSET_FLAGS] & FLAG_CREDENTIALS != 0 {
        let ssid = field(buf, OFFSET_SSID_LEN, OFFSET_SSID, SSID_MAX_BYTES)?;
        let password = field(buf, OFFSET_PASSWORD_LEN, OFFSET_PASSWORD, PASSWORD_MAX_BYTES)?;
        Some(WifiCredentials::new(ssid, password).ok_or(FlashSettingsError::Corrupted)?)
    } else {
        None
    };

    Ok(Some(PersistedSettings::new(window).with_credentials(credentials)))
}

fn field(
    buf: &[u8; SETTINGS_RECORD_LEN],
    len_at: usize,
    start: usize,
    max: usize,
) -> Result<&str, FlashSettingsError> {
    let len = buf[len_at] as usize;
    if len > max {
        return Err(FlashSettingsError::Corrupted);
    }
    core::str::from_utf8(&buf[start..start + len]).map_err(|_| FlashSettingsError::Corrupted)
}

fn check(rc: i32) -> Result<(), FlashSettingsError> {
    if rc == ESP_ROM_SPIFLASH_RESULT_OK {
        Ok(())
    } else {
        Err(FlashSettingsError::FlashOpFailed(rc))
    }
}

fn checksum32(bytes: &[u8]) -> u32 {
    let mut hash = 0x811C9DC5u32;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
