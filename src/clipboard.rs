use std::io::Cursor;

use log::debug;

use crate::error::ClipboardError;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;
const BITMAPINFOHEADER_SIZE: usize = 40;
const MAX_DIMENSION: i32 = 10000;

/// Read and write access to the shared system clipboard.
pub trait ClipboardAccess {
    /// Returns the clipboard image as PNG bytes, or `None` when the clipboard
    /// holds no image.
    fn read_image(&mut self) -> Result<Option<Vec<u8>>, ClipboardError>;

    /// Replaces the clipboard contents with plain text.
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The platform clipboard. The arboard handle is opened on first use and
/// dropped after a failure, so an unavailable clipboard is retried on the next
/// cycle instead of failing startup.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new()
                .map_err(|e| ClipboardError::Unavailable(e.to_string()))?,
        };
        Ok(self.inner.insert(clipboard))
    }
}

impl ClipboardAccess for SystemClipboard {
    #[cfg(target_os = "windows")]
    fn read_image(&mut self) -> Result<Option<Vec<u8>>, ClipboardError> {
        native::read_image()
    }

    #[cfg(target_os = "macos")]
    fn read_image(&mut self) -> Result<Option<Vec<u8>>, ClipboardError> {
        if let Some(png) = pasteboard::data_for_type("public.png") {
            debug!("Found public.png on the pasteboard, {} bytes", png.len());
            return Ok(Some(png));
        }
        if let Some(tiff) = pasteboard::data_for_type("public.tiff") {
            debug!("Found public.tiff on the pasteboard, {} bytes", tiff.len());
            return tiff_to_png(&tiff).map(Some);
        }
        Ok(None)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn read_image(&mut self) -> Result<Option<Vec<u8>>, ClipboardError> {
        let image = self.handle()?.get_image();
        match image {
            Ok(image) => {
                debug!("Clipboard bitmap {}x{}", image.width, image.height);
                rgba_to_png(image.width as u32, image.height as u32, &image.bytes).map(Some)
            }
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(arboard::Error::ConversionFailure) => {
                log::warn!("Clipboard image could not be converted, ignoring it");
                Ok(None)
            }
            Err(e) => {
                self.inner = None;
                Err(ClipboardError::Access(e.to_string()))
            }
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let result = self.handle()?.set_text(text.to_owned());
        result.map_err(|e| {
            self.inner = None;
            ClipboardError::Access(e.to_string())
        })
    }
}

#[cfg(target_os = "macos")]
mod pasteboard {
    use objc2_app_kit::NSPasteboard;
    use objc2_foundation::NSString;

    /// Raw bytes of the general pasteboard's item for a uniform type identifier.
    pub(super) fn data_for_type(uti: &str) -> Option<Vec<u8>> {
        unsafe {
            let pasteboard = NSPasteboard::generalPasteboard();
            let data = pasteboard.dataForType(&NSString::from_str(uti))?;
            Some(data.to_vec())
        }
    }
}

#[cfg(target_os = "windows")]
mod native {
    use log::debug;
    use windows::core::w;
    use windows::Win32::Foundation::HGLOBAL;
    use windows::Win32::System::DataExchange::{
        CloseClipboard, GetClipboardData, IsClipboardFormatAvailable, OpenClipboard,
        RegisterClipboardFormatW,
    };
    use windows::Win32::System::Memory::{GlobalLock, GlobalSize, GlobalUnlock};

    use super::dib_to_png;
    use crate::error::ClipboardError;

    const CF_DIB: u32 = 8;
    const CF_DIBV5: u32 = 17;

    struct OpenGuard;

    impl OpenGuard {
        fn open() -> Result<Self, ClipboardError> {
            unsafe { OpenClipboard(None) }.map_err(|e| ClipboardError::Access(e.to_string()))?;
            Ok(Self)
        }
    }

    impl Drop for OpenGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseClipboard();
            }
        }
    }

    pub(super) fn read_image() -> Result<Option<Vec<u8>>, ClipboardError> {
        let _guard = OpenGuard::open()?;

        let png_format = unsafe { RegisterClipboardFormatW(w!("PNG")) };
        if png_format != 0 {
            if let Some(png) = unsafe { copy_format(png_format) } {
                debug!("Found PNG clipboard format, {} bytes", png.len());
                return Ok(Some(png));
            }
        }

        for format in [CF_DIBV5, CF_DIB] {
            if let Some(dib) = unsafe { copy_format(format) } {
                debug!("Found bitmap clipboard format {}, {} bytes", format, dib.len());
                return dib_to_png(&dib).map(Some);
            }
        }

        Ok(None)
    }

    /// Copies the global memory block behind `format`. The clipboard must be open.
    unsafe fn copy_format(format: u32) -> Option<Vec<u8>> {
        if IsClipboardFormatAvailable(format).is_err() {
            return None;
        }
        let handle = GetClipboardData(format).ok()?;
        read_global(HGLOBAL(handle.0))
    }

    /// Copies a global memory block, releasing the lock on every path.
    /// An empty block reads as `None`.
    unsafe fn read_global(hglobal: HGLOBAL) -> Option<Vec<u8>> {
        let ptr = GlobalLock(hglobal) as *const u8;
        if ptr.is_null() {
            return None;
        }
        let size = GlobalSize(hglobal);
        let bytes = (size > 0).then(|| std::slice::from_raw_parts(ptr, size).to_vec());
        let _ = GlobalUnlock(hglobal);
        bytes
    }

}

/// Re-encodes a TIFF (the macOS pasteboard's bitmap type) as PNG.
pub fn tiff_to_png(tiff: &[u8]) -> Result<Vec<u8>, ClipboardError> {
    let decoded = image::load_from_memory_with_format(tiff, image::ImageFormat::Tiff)?;
    let mut output = Vec::new();
    decoded.write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)?;
    debug!(
        "Converted {}x{} TIFF to PNG, size: {} bytes",
        decoded.width(),
        decoded.height(),
        output.len()
    );
    Ok(output)
}

/// Encodes raw RGBA8 pixels as PNG.
pub fn rgba_to_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>, ClipboardError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() < expected {
        return Err(ClipboardError::MalformedBitmap(format!(
            "{}x{} RGBA image needs {} bytes, got {}",
            width,
            height,
            expected,
            rgba.len()
        )));
    }
    encode_png(&rgba[..expected], width, height, image::ExtendedColorType::Rgba8)
}

/// Converts a packed device-independent bitmap (header followed by pixel
/// rows, the layout of `CF_DIB`/`CF_DIBV5`) into PNG.
pub fn dib_to_png(dib: &[u8]) -> Result<Vec<u8>, ClipboardError> {
    let header_size = read_u32(dib, 0)? as usize;
    if header_size < BITMAPINFOHEADER_SIZE {
        return Err(ClipboardError::MalformedBitmap(format!(
            "header size {} is too small",
            header_size
        )));
    }

    let dib_width = read_u32(dib, 4)? as i32;
    let dib_height = read_u32(dib, 8)? as i32;
    let bit_count = read_u16(dib, 14)?;
    let compression = read_u32(dib, 16)?;
    let colors_used = read_u32(dib, 32)? as usize;

    debug!(
        "DIB info - header: {}, width: {}, height: {}, bit_count: {}, compression: {}",
        header_size, dib_width, dib_height, bit_count, compression
    );

    if dib_width <= 0
        || dib_height == 0
        || dib_width > MAX_DIMENSION
        || dib_height.unsigned_abs() > MAX_DIMENSION as u32
    {
        return Err(ClipboardError::MalformedBitmap(format!(
            "invalid dimensions {}x{}",
            dib_width, dib_height
        )));
    }

    let mut pixel_offset = header_size;
    match compression {
        BI_RGB => {}
        BI_BITFIELDS if bit_count == 32 => {
            // Masks live inside V4/V5 headers but trail a plain info header.
            let mask_offset = if header_size > BITMAPINFOHEADER_SIZE {
                BITMAPINFOHEADER_SIZE
            } else {
                pixel_offset += 12;
                header_size
            };
            let masks = (
                read_u32(dib, mask_offset)?,
                read_u32(dib, mask_offset + 4)?,
                read_u32(dib, mask_offset + 8)?,
            );
            if masks != (0x00FF_0000, 0x0000_FF00, 0x0000_00FF) {
                return Err(ClipboardError::UnsupportedBitmap(format!(
                    "channel masks {:08x}/{:08x}/{:08x}",
                    masks.0, masks.1, masks.2
                )));
            }
        }
        other => {
            return Err(ClipboardError::UnsupportedBitmap(format!(
                "compression {} with {} bits per pixel",
                other, bit_count
            )));
        }
    }
    pixel_offset += colors_used * 4;

    let width = dib_width as usize;
    let height = dib_height.unsigned_abs() as usize;
    let bottom_up = dib_height > 0;

    let bytes_per_pixel = match bit_count {
        24 => 3,
        32 => 4,
        other => {
            return Err(ClipboardError::UnsupportedBitmap(format!(
                "{} bits per pixel",
                other
            )));
        }
    };

    let row_size = (width * bytes_per_pixel + 3) / 4 * 4;
    let pixels = dib
        .get(pixel_offset..)
        .filter(|p| p.len() >= row_size * height)
        .ok_or_else(|| {
            ClipboardError::MalformedBitmap(format!(
                "pixel data truncated, need {} bytes after offset {}",
                row_size * height,
                pixel_offset
            ))
        })?;

    let mut out = Vec::with_capacity(width * height * bytes_per_pixel);
    for y in 0..height {
        let src_y = if bottom_up { height - 1 - y } else { y };
        let row = &pixels[src_y * row_size..src_y * row_size + width * bytes_per_pixel];
        for px in row.chunks_exact(bytes_per_pixel) {
            out.extend_from_slice(&[px[2], px[1], px[0]]);
            if bytes_per_pixel == 4 {
                out.push(px[3]);
            }
        }
    }

    let (width, height) = (width as u32, height as u32);
    if bytes_per_pixel == 3 {
        return encode_png(&out, width, height, image::ExtendedColorType::Rgb8);
    }

    // Many producers leave the fourth byte zeroed; such bitmaps are opaque.
    if out.chunks_exact(4).all(|px| px[3] == 0) {
        out.chunks_exact_mut(4).for_each(|px| px[3] = 0xFF);
    }
    encode_png(&out, width, height, image::ExtendedColorType::Rgba8)
}

fn encode_png(
    buf: &[u8],
    width: u32,
    height: u32,
    color: image::ExtendedColorType,
) -> Result<Vec<u8>, ClipboardError> {
    let mut output = Vec::new();
    image::write_buffer_with_format(
        &mut Cursor::new(&mut output),
        buf,
        width,
        height,
        color,
        image::ImageFormat::Png,
    )?;
    debug!("Encoded {}x{} bitmap as PNG, size: {} bytes", width, height, output.len());
    Ok(output)
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ClipboardError> {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| ClipboardError::MalformedBitmap(format!("header truncated at {}", offset)))
}

fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ClipboardError> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| ClipboardError::MalformedBitmap(format!("header truncated at {}", offset)))
}
