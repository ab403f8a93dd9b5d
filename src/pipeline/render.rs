use crate::{config::RenderConfig, model::Instance};
use ab_glyph::{FontRef, PxScale};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use tracing::warn;

// First entries of the Detectron2 colormap
const PALETTE: [[u8; 3]; 8] = [
    [0, 114, 189],
    [217, 83, 25],
    [237, 177, 32],
    [126, 47, 142],
    [119, 172, 48],
    [77, 190, 238],
    [162, 20, 47],
    [77, 77, 77],
];

const BOX_THICKNESS: i32 = 2;

const LABEL_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const LABEL_SCALE: f32 = 14.0;
const LABEL_PADDING: i32 = 2;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Mask value marking a pixel as part of the instance.
pub const MASK_ON: u8 = 255;

pub fn instance_color(index: usize) -> Rgb<u8> {
    Rgb(PALETTE[index % PALETTE.len()])
}

/// `"<class> <score>%"`, as shown next to each instance.
pub fn label_text(class_name: &str, score: f32) -> String {
    format!("{} {:.0}%", class_name, score * 100.0)
}

/// Composites every instance onto a copy of `image`. Masks go first so boxes
/// and labels stay visible on top.
pub fn draw_instances(
    image: &RgbImage,
    instances: &[Instance],
    class_name: impl Fn(usize) -> String,
    config: &RenderConfig,
) -> RgbImage {
    let mut canvas = image.clone();

    for (index, instance) in instances.iter().enumerate() {
        let color = instance_color(index);

        if let Some(mask) = &instance.mask {
            blend_mask(&mut canvas, mask, color, config.mask_alpha);
            if config.draw_mask_outlines {
                outline_mask(&mut canvas, mask, darken(color));
            }
        }
    }

    if config.draw_boxes {
        for (index, instance) in instances.iter().enumerate() {
            draw_box(&mut canvas, instance, instance_color(index));
        }
    }

    if config.draw_labels && !instances.is_empty() {
        match FontRef::try_from_slice(LABEL_FONT) {
            Ok(font) => {
                for (index, instance) in instances.iter().enumerate() {
                    let text = label_text(&class_name(instance.class_id), instance.score);
                    draw_label(&mut canvas, instance, &text, instance_color(index), &font);
                }
            }
            Err(e) => warn!("Skipping instance labels, bundled font unreadable: {}", e),
        }
    }

    canvas
}

fn blend_mask(canvas: &mut RgbImage, mask: &GrayImage, color: Rgb<u8>, alpha: f32) {
    let (width, height) = overlap(canvas, mask);
    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y)[0] != MASK_ON {
                continue;
            }
            let pixel = canvas.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended = f32::from(pixel[c]) * (1.0 - alpha) + f32::from(color[c]) * alpha;
                pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn outline_mask(canvas: &mut RgbImage, mask: &GrayImage, color: Rgb<u8>) {
    let (width, height) = overlap(canvas, mask);
    let inside = |x: i64, y: i64| {
        x >= 0
            && y >= 0
            && x < i64::from(width)
            && y < i64::from(height)
            && mask.get_pixel(x as u32, y as u32)[0] == MASK_ON
    };

    for y in 0..height {
        for x in 0..width {
            let (xi, yi) = (i64::from(x), i64::from(y));
            if !inside(xi, yi) {
                continue;
            }
            let on_edge = !inside(xi - 1, yi)
                || !inside(xi + 1, yi)
                || !inside(xi, yi - 1)
                || !inside(xi, yi + 1);
            if on_edge {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

fn draw_box(canvas: &mut RgbImage, instance: &Instance, color: Rgb<u8>) {
    let bbox = instance.bbox;
    let x = bbox.x1.round() as i32;
    let y = bbox.y1.round() as i32;
    let width = bbox.width().round() as i32;
    let height = bbox.height().round() as i32;

    for inset in 0..BOX_THICKNESS {
        let (w, h) = (width - 2 * inset, height - 2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x + inset, y + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Text on a darkened tag at the box's top-left corner; above the box when
/// there is room, inside it otherwise.
fn draw_label(
    canvas: &mut RgbImage,
    instance: &Instance,
    text: &str,
    color: Rgb<u8>,
    font: &FontRef,
) {
    let scale = PxScale::from(LABEL_SCALE);
    let (text_width, text_height) = text_size(scale, font, text);
    let width = text_width as i32 + 2 * LABEL_PADDING;
    let height = text_height as i32 + 2 * LABEL_PADDING;

    let x = instance.bbox.x1.round() as i32;
    let top = instance.bbox.y1.round() as i32;
    let y = if top >= height { top - height } else { top };

    let tag = Rect::at(x, y).of_size(width.max(1) as u32, height.max(1) as u32);
    draw_filled_rect_mut(canvas, tag, darken(color));
    draw_text_mut(
        canvas,
        LABEL_TEXT_COLOR,
        x + LABEL_PADDING,
        y + LABEL_PADDING,
        scale,
        font,
        text,
    );
}

fn darken(color: Rgb<u8>) -> Rgb<u8> {
    Rgb(color.0.map(|c| (f32::from(c) * 0.7) as u8))
}

// Masks from a well-behaved runtime match the image; tolerate ones that don't.
fn overlap(canvas: &RgbImage, mask: &GrayImage) -> (u32, u32) {
    (
        canvas.width().min(mask.width()),
        canvas.height().min(mask.height()),
    )
}
