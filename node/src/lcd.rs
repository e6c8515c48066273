//! 16x2 HD44780 character LCD behind a PCF8574 I2C backpack.
//!
//! The backpack maps P0..P3 to RS, RW, EN and the backlight, and P4..P7 to
//! the controller's data lines D4..D7, so every byte goes out as two nibbles.

use std::{thread, time::Duration};

use esp_idf_hal::{
    delay::BLOCK,
    gpio::AnyIOPin,
    i2c::{I2cConfig, I2cDriver, I2C0},
    units::FromValueType,
};
use log::{info, warn};

use fire_alarm_common::{
    display::{fit_line, LCD_COLUMNS},
    HardwareError, TextDisplay,
};

const BIT_RS: u8 = 0x01;
const BIT_EN: u8 = 0x04;
const BIT_BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE_INCREMENT: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];
const I2C_BAUD_KHZ: u32 = 100;

pub struct Lcd {
    i2c: I2cDriver<'static>,
    address: u8,
    shown: Option<(String, String)>,
    write_failures: u64,
}

impl Lcd {
    pub fn new(i2c0: I2C0, sda: i32, scl: i32, address: u8) -> anyhow::Result<Self> {
        let config = I2cConfig::new().baudrate(I2C_BAUD_KHZ.kHz().into());
        let i2c = unsafe {
            I2cDriver::new(i2c0, AnyIOPin::new(sda), AnyIOPin::new(scl), &config)?
        };

        let mut lcd = Self {
            i2c,
            address,
            shown: None,
            write_failures: 0,
        };
        lcd.init()
            .map_err(|err| anyhow::anyhow!("lcd init at 0x{address:02x} failed: {err}"))?;
        info!("lcd ready at i2c address 0x{address:02x}");
        Ok(lcd)
    }

    fn init(&mut self) -> Result<(), HardwareError> {
        thread::sleep(Duration::from_millis(50));

        // Power-on reset into 8-bit mode three times, then switch to 4-bit.
        self.write_nibble(0x30, 0)?;
        thread::sleep(Duration::from_millis(5));
        self.write_nibble(0x30, 0)?;
        thread::sleep(Duration::from_millis(5));
        self.write_nibble(0x30, 0)?;
        thread::sleep(Duration::from_millis(1));
        self.write_nibble(0x20, 0)?;

        self.command(CMD_FUNCTION_4BIT_2LINE)?;
        self.command(CMD_DISPLAY_ON)?;
        self.command(CMD_ENTRY_MODE_INCREMENT)?;
        self.clear()
    }

    fn clear(&mut self) -> Result<(), HardwareError> {
        self.command(CMD_CLEAR)?;
        thread::sleep(Duration::from_millis(2));
        Ok(())
    }

    fn set_cursor(&mut self, row: usize, col: u8) -> Result<(), HardwareError> {
        let offset = ROW_OFFSETS[row.min(ROW_OFFSETS.len() - 1)];
        self.command(CMD_SET_DDRAM | (offset + col))
    }

    fn print(&mut self, text: &str) -> Result<(), HardwareError> {
        for ch in text.chars() {
            let byte = if ch.is_ascii() { ch as u8 } else { b'?' };
            self.write_byte(byte, BIT_RS)?;
        }
        Ok(())
    }

    fn draw(&mut self, (line1, line2): &(String, String)) -> Result<(), HardwareError> {
        self.set_cursor(0, 0)?;
        self.print(line1)?;
        self.set_cursor(1, 0)?;
        self.print(line2)
    }

    fn command(&mut self, cmd: u8) -> Result<(), HardwareError> {
        self.write_byte(cmd, 0)
    }

    fn write_byte(&mut self, value: u8, mode: u8) -> Result<(), HardwareError> {
        self.write_nibble(value & 0xF0, mode)?;
        self.write_nibble((value << 4) & 0xF0, mode)
    }

    fn write_nibble(&mut self, high_bits: u8, mode: u8) -> Result<(), HardwareError> {
        let frame = high_bits | mode | BIT_BACKLIGHT;
        self.expander_write(frame | BIT_EN)?;
        thread::sleep(Duration::from_micros(1));
        self.expander_write(frame & !BIT_EN)?;
        thread::sleep(Duration::from_micros(50));
        Ok(())
    }

    fn expander_write(&mut self, data: u8) -> Result<(), HardwareError> {
        self.i2c
            .write(self.address, &[data], BLOCK)
            .map_err(|err| HardwareError::Display(format!("{err:?}")))
    }
}

impl TextDisplay for Lcd {
    fn render(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError> {
        let frame = (padded(line1), padded(line2));
        if self.shown.as_ref() == Some(&frame) {
            return Ok(());
        }

        match self.draw(&frame) {
            Ok(()) => {
                self.shown = Some(frame);
                Ok(())
            }
            Err(err) => {
                self.write_failures = self.write_failures.saturating_add(1);
                self.shown = None;
                warn!("lcd write failed ({} so far): {err}", self.write_failures);
                Err(err)
            }
        }
    }
}

/// Full-width row so a shorter line overwrites the previous one.
fn padded(text: &str) -> String {
    format!("{:<width$}", fit_line(text), width = LCD_COLUMNS)
}
