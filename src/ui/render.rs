//! Software blitting into the softbuffer frame (one `u32` per pixel,
//! 0x00RRGGBB).

pub const BG_COLOR: [u8; 3] = [31, 31, 31];

/// Gap between the two pages of a spread, in window pixels.
pub const SPREAD_GAP: f32 = 0.0;

#[inline]
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[inline]
fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

pub fn fit_scale(img_w: f32, img_h: f32, win_w: f32, win_h: f32) -> f32 {
    (win_w / img_w).min(win_h / img_h)
}

/// Where a page lands in the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x0: f32,
    pub y0: f32,
    pub scale: f32,
}

/// Lay out `sizes` left to right at a shared height, the whole row fitted
/// into the window and centred.
pub fn layout_pages(sizes: &[(u32, u32)], win_w: f32, win_h: f32) -> Vec<Placement> {
    let usable: Vec<(f32, f32)> = sizes
        .iter()
        .map(|&(w, h)| (w.max(1) as f32, h.max(1) as f32))
        .collect();
    if usable.is_empty() {
        return Vec::new();
    }
    // Row width when every page is scaled to a height of 1.
    let gaps = SPREAD_GAP * (usable.len() - 1) as f32;
    let unit_w: f32 = usable.iter().map(|(w, h)| w / h).sum();
    let row_h = fit_scale(unit_w, 1.0, (win_w - gaps).max(1.0), win_h);
    let row_w = unit_w * row_h + gaps;

    let mut x = (win_w - row_w) / 2.0;
    let y0 = (win_h - row_h) / 2.0;
    usable
        .iter()
        .map(|&(w, h)| {
            let scale = row_h / h;
            let placed = Placement { x0: x, y0, scale };
            x += w * scale + SPREAD_GAP;
            placed
        })
        .collect()
}

/// Nearest-neighbour blit of an RGBA image, alpha-blended over `dst`.
pub fn blit_scaled(
    dst: &mut [u32], dst_w: u32, dst_h: u32,
    src: &[u8], src_w: u32, src_h: u32,
    at: Placement,
) {
    if src_w == 0 || src_h == 0 || at.scale <= 0.0 {
        return;
    }
    let draw_w = src_w as f32 * at.scale;
    let draw_h = src_h as f32 * at.scale;

    let dx_start = at.x0.max(0.0) as u32;
    let dy_start = at.y0.max(0.0) as u32;
    let dx_end = ((at.x0 + draw_w).ceil().max(0.0) as u32).min(dst_w);
    let dy_end = ((at.y0 + draw_h).ceil().max(0.0) as u32).min(dst_h);

    let inv_scale = 1.0 / at.scale;

    for dy in dy_start..dy_end {
        let sy = ((dy as f32 - at.y0) * inv_scale) as u32;
        if sy >= src_h {
            continue;
        }
        for dx in dx_start..dx_end {
            let sx = ((dx as f32 - at.x0) * inv_scale) as u32;
            if sx >= src_w {
                continue;
            }

            let si = (sy as usize * src_w as usize + sx as usize) * 4;
            let di = dy as usize * dst_w as usize + dx as usize;
            if si + 3 >= src.len() || di >= dst.len() {
                continue;
            }

            let sa = src[si + 3] as u32;
            if sa == 255 {
                dst[di] = rgb(src[si], src[si + 1], src[si + 2]);
            } else if sa > 0 {
                let inv = 255 - sa;
                let (dr, dg, db) = unpack_rgb(dst[di]);
                let r = ((src[si] as u32 * sa + dr as u32 * inv) / 255) as u8;
                let g = ((src[si + 1] as u32 * sa + dg as u32 * inv) / 255) as u8;
                let b = ((src[si + 2] as u32 * sa + db as u32 * inv) / 255) as u8;
                dst[di] = rgb(r, g, b);
            }
        }
    }
}
