// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! GPU (Graphics Processing Unit) implementation
//!
//! This module implements the command and timing front end of the Sony
//! CXD8561Q GPU:
//!
//! - **GP0** (0x1F801810 write): drawing and VRAM transfer commands. A
//!   table-driven state machine latches the top byte of the first word,
//!   buffers the command's fixed number of parameter words, then runs the
//!   handler. Image loads switch the port into a raw data mode for the
//!   duration of the transfer.
//! - **GP1** (0x1F801814 write): control commands (reset, display enable,
//!   DMA direction, display area and mode).
//! - **GPUSTAT** (0x1F801814 read): synthesized from the stored state.
//! - **Video timing**: a dotclock/scanline tracker driven by the shared
//!   [`TimeHandler`], converting CPU cycles into GPU clock ticks through
//!   [`FracCycles`]. It raises the VBLANK interrupt, toggles the interlace
//!   field and notifies the renderer at each frame end.
//!
//! Rasterization is not performed here: draw commands are decomposed into
//! triangles and streamed to the host through the [`Renderer`] trait.
//!
//! # References
//!
//! - [PSX-SPX: GPU](http://problemkaputt.de/psx-spx.htm#gpu)

use crate::core::interrupt::{interrupts, InterruptController};
use crate::core::timing::{Cycles, FracCycles, Peripheral, TimeHandler};

mod renderer;
pub use renderer::{CollectingRenderer, NullRenderer, Renderer, Vertex};

/// CPU clock speed in MHz
const CPU_FREQ_MHZ: f32 = 33.8685;

/// Video standard of the emulated console
///
/// Decides the GPU clock speed and the scanline geometry. The BIOS
/// configures the matching mode through GP1(0x08) based on the disc region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareType {
    /// NTSC: 480i60, 53.69MHz GPU clock
    Ntsc,
    /// PAL: 576i50, 53.20MHz GPU clock
    Pal,
}

/// Depth of the pixel values in a texture page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureDepth {
    /// 4 bits per pixel
    T4Bit = 0,
    /// 8 bits per pixel
    T8Bit = 1,
    /// 15 bits per pixel
    T15Bit = 2,
}

/// Interlaced output splits each frame in two fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Bottom field (even lines)
    Bottom = 0,
    /// Top field (odd lines)
    Top = 1,
}

/// Video output horizontal resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HorizontalRes(u8);

impl HorizontalRes {
    /// Create a new HorizontalRes instance from the 2 bit field `hr1` and
    /// the one bit field `hr2`
    fn from_fields(hr1: u8, hr2: u8) -> HorizontalRes {
        let hr = (hr2 & 1) | ((hr1 & 3) << 1);

        HorizontalRes(hr)
    }

    /// Retrieve value of bits [18:16] of the status register
    fn into_status(self) -> u32 {
        let HorizontalRes(hr) = self;

        (hr as u32) << 16
    }

    /// Return the divider used to generate the dotclock from the GPU clock
    fn dotclock_divider(self) -> u8 {
        let hr1 = (self.0 >> 1) & 0x3;
        let hr2 = self.0 & 1;

        if hr2 != 0 {
            // HRes ~ 368 pixels
            7
        } else {
            match hr1 {
                // HRes ~ 256 pixels
                0 => 10,
                // HRes ~ 320 pixels
                1 => 8,
                // HRes ~ 512 pixels
                2 => 5,
                // HRes ~ 640 pixels
                3 => 4,
                _ => unreachable!(),
            }
        }
    }
}

/// Video output vertical resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerticalRes {
    /// 240 lines
    Y240Lines = 0,
    /// 480 lines (only available for interlaced output)
    Y480Lines = 1,
}

/// Display area color depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayDepth {
    /// 15 bits per pixel
    D15Bits = 0,
    /// 24 bits per pixel
    D24Bits = 1,
}

/// Requested DMA direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    /// No DMA
    Off = 0,
    /// FIFO status query
    Fifo = 1,
    /// CPU (or DMA) writes to GP0
    CpuToGp0 = 2,
    /// DMA reads from VRAM through GPUREAD
    VRamToCpu = 3,
}

/// Possible states for the GP0 command register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gp0Mode {
    /// Default mode: handling commands
    Command,
    /// Loading an image into VRAM
    ImageLoad,
}

/// Buffer holding a multi-word GP0 command while its parameters arrive
struct CommandBuffer {
    /// Command buffer: the longest possible command is GP0(0x3E) which
    /// takes 12 parameters
    buffer: [u32; 12],
    /// Number of words queued in buffer
    len: u8,
}

impl CommandBuffer {
    fn new() -> CommandBuffer {
        CommandBuffer {
            buffer: [0; 12],
            len: 0,
        }
    }

    /// Clear the command buffer
    fn clear(&mut self) {
        self.len = 0;
    }

    fn push_word(&mut self, word: u32) {
        self.buffer[self.len as usize] = word;
        self.len += 1;
    }
}

impl std::ops::Index<usize> for CommandBuffer {
    type Output = u32;

    fn index(&self, index: usize) -> &u32 {
        if index >= self.len as usize {
            panic!(
                "Command buffer index out of range: {} ({})",
                index, self.len
            );
        }

        &self.buffer[index]
    }
}

/// Staging buffer for CPU→VRAM image transfers
struct ImageBuffer {
    /// Top-left corner of the target rectangle in VRAM
    top_left: (u16, u16),
    /// Rectangle resolution
    resolution: (u16, u16),
    /// Number of halfwords received so far
    index: u32,
}

impl ImageBuffer {
    fn new() -> ImageBuffer {
        ImageBuffer {
            top_left: (0, 0),
            resolution: (0, 0),
            index: 0,
        }
    }

    fn reset(&mut self, x: u16, y: u16, width: u16, height: u16) {
        self.top_left = (x, y);
        self.resolution = (width, height);
        self.index = 0;
    }

    fn push_word(&mut self, _word: u32) {
        // The core keeps no VRAM; the pixels are consumed for sequencing
        // only. A host that wants texture data can hook this up later.
        self.index += 2;
    }
}

/// GPU state: drawing parameters, display parameters, GP0 pipeline state
/// and the dotclock/scanline tracker
pub struct Gpu {
    /// Texture page base X coordinate (4 bits, 64 byte increment)
    page_base_x: u8,
    /// Texture page base Y coordinate (1bit, 256 line increment)
    page_base_y: u8,
    /// Semi-transparency mode
    semi_transparency: u8,
    /// Texture page color depth
    texture_depth: TextureDepth,
    /// Texture window x mask (8 pixel steps)
    texture_window_x_mask: u8,
    /// Texture window y mask (8 pixel steps)
    texture_window_y_mask: u8,
    /// Texture window x offset (8 pixel steps)
    texture_window_x_offset: u8,
    /// Texture window y offset (8 pixel steps)
    texture_window_y_offset: u8,
    /// Enable dithering from 24 to 15bits RGB
    dithering: bool,
    /// Allow drawing to the display area
    draw_to_display: bool,
    /// When true all textures are disabled
    texture_disable: bool,
    /// Mirror textured rectangles along the x axis
    rectangle_texture_x_flip: bool,
    /// Mirror textured rectangles along the y axis
    rectangle_texture_y_flip: bool,
    /// Left-most column of the drawing area
    drawing_area_left: u16,
    /// Top-most line of the drawing area
    drawing_area_top: u16,
    /// Right-most column of the drawing area
    drawing_area_right: u16,
    /// Bottom-most line of the drawing area
    drawing_area_bottom: u16,
    /// Drawing offset applied to all vertices by the renderer
    drawing_offset: (i16, i16),
    /// Force "mask" bit of the pixel to 1 when writing to VRAM
    force_set_mask_bit: bool,
    /// Don't draw to pixels which have the "mask" bit set
    preserve_masked_pixels: bool,
    /// DMA request direction
    dma_direction: DmaDirection,
    /// Disable the display
    display_disabled: bool,
    /// First column of the display area in VRAM
    display_vram_x_start: u16,
    /// First line of the display area in VRAM
    display_vram_y_start: u16,
    /// Display output horizontal start relative to HSYNC, in GPU ticks
    display_horiz_start: u16,
    /// Display output horizontal end relative to HSYNC, in GPU ticks
    display_horiz_end: u16,
    /// Display output first line relative to VSYNC
    display_line_start: u16,
    /// Display output last line relative to VSYNC
    display_line_end: u16,
    /// Display depth: the GPU itself always draws 15 bit RGB, 24 bit output
    /// must use external assets (pre-rendered textures, MDEC, etc...)
    display_depth: DisplayDepth,
    /// Video output horizontal resolution
    hres: HorizontalRes,
    /// Video output vertical resolution
    vres: VerticalRes,
    /// Video standard (NTSC or PAL) currently configured through GP1(0x08)
    hardware: HardwareType,
    /// Output interlaced video signal instead of progressive
    interlaced: bool,
    /// Currently displayed field. For progressive output this is always
    /// Top.
    field: Field,
    /// GP0(0x1F) interrupt, acknowledged by GP1(0x02)
    gp0_interrupt: bool,
    /// True when the GPU is in the vertical blanking interval
    vblank_interrupt: bool,
    /// Buffer containing the current GP0 command
    gp0_command: CommandBuffer,
    /// Remaining words for the current GP0 command
    gp0_words_remaining: u32,
    /// Method implementing the current GP0 command
    gp0_handler: fn(&mut Gpu),
    /// Current mode of the GP0 register
    gp0_mode: Gp0Mode,
    /// Staging buffer for CPU→VRAM transfers
    image_buffer: ImageBuffer,
    /// Next word returned by GPUREAD
    read_word: u32,
    /// Fractional GPU cycle remainder from the previous sync (16 bit
    /// fixed point fraction of one GPU clock tick)
    clock_phase: u16,
    /// Currently displayed video output line
    display_line: u16,
    /// Current GPU clock tick within the current line
    display_line_tick: u16,
    /// Counter incremented at each frame end
    frame: u64,
    /// Host-side consumer of the vertex stream
    renderer: Box<dyn Renderer>,
}

impl Gpu {
    /// Create a GPU in its post-reset state
    pub fn new(hardware: HardwareType, renderer: Box<dyn Renderer>) -> Gpu {
        Gpu {
            page_base_x: 0,
            page_base_y: 0,
            semi_transparency: 0,
            texture_depth: TextureDepth::T4Bit,
            texture_window_x_mask: 0,
            texture_window_y_mask: 0,
            texture_window_x_offset: 0,
            texture_window_y_offset: 0,
            dithering: false,
            draw_to_display: false,
            texture_disable: false,
            rectangle_texture_x_flip: false,
            rectangle_texture_y_flip: false,
            drawing_area_left: 0,
            drawing_area_top: 0,
            drawing_area_right: 0,
            drawing_area_bottom: 0,
            drawing_offset: (0, 0),
            force_set_mask_bit: false,
            preserve_masked_pixels: false,
            dma_direction: DmaDirection::Off,
            display_disabled: true,
            display_vram_x_start: 0,
            display_vram_y_start: 0,
            display_horiz_start: 0x200,
            display_horiz_end: 0xc00,
            display_line_start: 0x10,
            display_line_end: 0x100,
            display_depth: DisplayDepth::D15Bits,
            hres: HorizontalRes::from_fields(0, 0),
            vres: VerticalRes::Y240Lines,
            hardware,
            interlaced: false,
            field: Field::Top,
            gp0_interrupt: false,
            vblank_interrupt: false,
            gp0_command: CommandBuffer::new(),
            gp0_words_remaining: 0,
            gp0_handler: Gpu::gp0_nop,
            gp0_mode: Gp0Mode::Command,
            image_buffer: ImageBuffer::new(),
            read_word: 0,
            clock_phase: 0,
            display_line: 0,
            display_line_tick: 0,
            frame: 0,
            renderer,
        }
    }

    /// Number of completed frames since power-on
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Currently displayed line
    pub fn display_line(&self) -> u16 {
        self.display_line
    }

    /// Drawing offset, to be applied to vertices by the render consumer
    pub fn drawing_offset(&self) -> (i16, i16) {
        self.drawing_offset
    }

    /// Current DMA direction
    pub fn dma_direction(&self) -> DmaDirection {
        self.dma_direction
    }

    /// Top-left corner of the displayed VRAM area
    pub fn display_vram_start(&self) -> (u16, u16) {
        (self.display_vram_x_start, self.display_vram_y_start)
    }

    /// Horizontal display window relative to HSYNC, in GPU ticks
    pub fn display_horiz_range(&self) -> (u16, u16) {
        (self.display_horiz_start, self.display_horiz_end)
    }

    /// True while the display output is disabled
    pub fn display_disabled(&self) -> bool {
        self.display_disabled
    }

    // ========== Video timing ==========

    /// GPU clock speed in MHz for the configured standard
    fn gpu_freq_mhz(&self) -> f32 {
        match self.hardware {
            HardwareType::Ntsc => 53.69,
            HardwareType::Pal => 53.20,
        }
    }

    /// Ratio of GPU clock ticks per CPU clock cycle
    fn gpu_to_cpu_clock_ratio(&self) -> FracCycles {
        FracCycles::from_f32(self.gpu_freq_mhz() / CPU_FREQ_MHZ)
    }

    /// Duration of one GPU clock tick in CPU cycles
    fn gpu_clock_period(&self) -> FracCycles {
        FracCycles::from_f32(CPU_FREQ_MHZ / self.gpu_freq_mhz())
    }

    /// Number of GPU clock ticks in a line
    fn ticks_per_line(&self) -> u16 {
        match self.hardware {
            HardwareType::Ntsc => 3412,
            HardwareType::Pal => 3404,
        }
    }

    /// Total number of lines in a frame, blanking included
    fn lines_per_frame(&self) -> u16 {
        match self.hardware {
            HardwareType::Ntsc => 263,
            HardwareType::Pal => 314,
        }
    }

    /// Duration of one dotclock tick in CPU cycles
    pub fn dotclock_period(&self) -> FracCycles {
        let divider = self.hres.dotclock_divider();

        FracCycles::from_cycles(divider as Cycles).multiply(self.gpu_clock_period())
    }

    /// Time already elapsed in the current dotclock tick, in CPU cycles
    pub fn dotclock_phase(&self) -> FracCycles {
        let divider = self.hres.dotclock_divider() as u16;
        let ticks_into = (self.display_line_tick % divider) as Cycles;

        FracCycles::from_cycles(ticks_into).multiply(self.gpu_clock_period())
    }

    /// Duration of one horizontal sync period in CPU cycles
    pub fn hsync_period(&self) -> FracCycles {
        FracCycles::from_cycles(self.ticks_per_line() as Cycles).multiply(self.gpu_clock_period())
    }

    /// Time already elapsed in the current line, in CPU cycles
    pub fn hsync_phase(&self) -> FracCycles {
        FracCycles::from_cycles(self.display_line_tick as Cycles)
            .multiply(self.gpu_clock_period())
    }

    /// True when the displayed line is in the vertical blanking interval
    fn in_vblank(&self) -> bool {
        self.display_line < self.display_line_start || self.display_line >= self.display_line_end
    }

    /// Synchronize the video output with the shared clock
    ///
    /// Advances the scanline tracker by the elapsed CPU cycles, raising the
    /// VBLANK interrupt on blanking entry and invoking the renderer's frame
    /// end hook on blanking exit.
    pub fn sync(&mut self, th: &mut TimeHandler, irq: &mut InterruptController) {
        let delta = th.sync(Peripheral::Gpu);

        // Convert the delta into GPU clock ticks, carrying the fractional
        // remainder between calls so nothing drifts.
        let ratio = self.gpu_to_cpu_clock_ratio().get_fp();
        let delta = self.clock_phase as Cycles + delta * ratio;

        self.clock_phase = (delta & 0xFFFF) as u16;
        let ticks = delta >> FracCycles::FRAC_BITS;

        let ticks_per_line = self.ticks_per_line() as Cycles;
        let lines_per_frame = self.lines_per_frame() as Cycles;

        let line_tick = self.display_line_tick as Cycles + ticks;
        let line = self.display_line as Cycles + line_tick / ticks_per_line;

        self.display_line_tick = (line_tick % ticks_per_line) as u16;

        if line >= lines_per_frame {
            // New frame(s). With interlaced output the field parity flips
            // on every frame wrap.
            if self.interlaced {
                let nframes = line / lines_per_frame;

                if nframes & 1 == 1 {
                    self.field = match self.field {
                        Field::Top => Field::Bottom,
                        Field::Bottom => Field::Top,
                    };
                }
            }

            self.display_line = (line % lines_per_frame) as u16;
        } else {
            self.display_line = line as u16;
        }

        let vblank = self.in_vblank();

        if !self.vblank_interrupt && vblank {
            // Rising edge of the blanking interval
            irq.request(interrupts::VBLANK);
        }

        if self.vblank_interrupt && !vblank {
            // End of the blanking interval: the frame is complete
            self.frame += 1;
            self.renderer.frame_end();
            log::trace!("GPU: frame {} ends at line {}", self.frame, self.display_line);
        }

        self.vblank_interrupt = vblank;

        self.predict_next_sync(th);
    }

    /// Schedule the next mandatory GPU sync at the next VBLANK boundary
    fn predict_next_sync(&self, th: &mut TimeHandler) {
        let ticks_per_line = self.ticks_per_line() as Cycles;
        let lines_per_frame = self.lines_per_frame() as Cycles;

        let cur_line = self.display_line as Cycles;
        let line_start = self.display_line_start as Cycles;
        let line_end = self.display_line_end as Cycles;

        // Ticks to get to the start of the next line
        let mut delta = ticks_per_line - self.display_line_tick as Cycles;

        // Full lines between the next line and the target line
        let lines = if cur_line >= line_end {
            // Bottom blanking: wake up when the blanking ends at the start
            // of the next frame
            lines_per_frame - cur_line - 1 + line_start
        } else if cur_line < line_start {
            // Top blanking: wake up when the display starts
            line_start - cur_line - 1
        } else {
            // Active display: wake up when the blanking starts
            line_end - cur_line - 1
        };

        delta += lines * ticks_per_line;

        // Convert the GPU tick count back into CPU cycles, rounding up so
        // we never wake up early.
        let delta = FracCycles::from_cycles(delta).divide(self.gpu_to_cpu_clock_ratio());

        th.set_next_sync_delta(Peripheral::Gpu, delta.ceil());
    }

    // ========== Registers ==========

    /// Retrieve value of the status register (GPUSTAT)
    pub fn status(&self) -> u32 {
        let mut r = 0u32;

        r |= (self.page_base_x as u32) << 0;
        r |= (self.page_base_y as u32) << 4;
        r |= (self.semi_transparency as u32) << 5;
        r |= (self.texture_depth as u32) << 7;
        r |= (self.dithering as u32) << 9;
        r |= (self.draw_to_display as u32) << 10;
        r |= (self.force_set_mask_bit as u32) << 11;
        r |= (self.preserve_masked_pixels as u32) << 12;
        r |= (self.field as u32) << 13;
        // Bit 14: not supported (would distort the display)
        r |= (self.texture_disable as u32) << 15;
        r |= self.hres.into_status();
        r |= (self.vres as u32) << 19;

        let video_mode = match self.hardware {
            HardwareType::Ntsc => 0,
            HardwareType::Pal => 1,
        };
        r |= video_mode << 20;

        r |= (self.display_depth as u32) << 21;
        r |= (self.interlaced as u32) << 22;
        r |= (self.display_disabled as u32) << 23;
        r |= (self.gp0_interrupt as u32) << 24;

        // We're always ready to receive a command, to send VRAM data and to
        // receive a DMA block; the command pipeline has no latency model.
        r |= 1 << 26;
        r |= 1 << 27;
        r |= 1 << 28;

        r |= (self.dma_direction as u32) << 29;

        // Bit 31: currently displayed line is odd and we're not in the
        // blanking interval
        let line_odd = (self.display_line & 1 == 1) && !self.vblank_interrupt;
        r |= (line_odd as u32) << 31;

        // Bit 25 mirrors a DMA request state picked by the direction
        let dma_request = match self.dma_direction {
            DmaDirection::Off => 0,
            // Should be 0 when the FIFO is full; ours never is
            DmaDirection::Fifo => 1,
            // Should be the same as bit 28 (ready to receive DMA block)
            DmaDirection::CpuToGp0 => (r >> 28) & 1,
            // Should be the same as bit 27 (ready to send VRAM to CPU)
            DmaDirection::VRamToCpu => (r >> 27) & 1,
        };

        r |= dma_request << 25;

        r
    }

    /// Retrieve value of the GPUREAD register
    pub fn read(&self) -> u32 {
        // VRAM stores are not backed by pixel data, so this only returns
        // values latched by GP1(0x10).
        self.read_word
    }

    // ========== GP0: drawing commands ==========

    /// Handle writes to the GP0 command register
    pub fn gp0(&mut self, val: u32) {
        if self.gp0_words_remaining == 0 {
            // Start a new GP0 command
            let opcode = (val >> 24) & 0xFF;

            let (len, handler): (u32, fn(&mut Gpu)) = match opcode {
                0x00 => (1, Gpu::gp0_nop),
                0x01 => (1, Gpu::gp0_clear_cache),
                0x02 => (3, Gpu::gp0_fill_rect),
                0x28 => (5, Gpu::gp0_quad_mono_opaque),
                0x2C => (9, Gpu::gp0_quad_texture_blend_opaque),
                0x30 => (6, Gpu::gp0_triangle_shaded_opaque),
                0x38 => (8, Gpu::gp0_quad_shaded_opaque),
                0xA0 => (3, Gpu::gp0_image_load),
                0xC0 => (3, Gpu::gp0_image_store),
                0xE1 => (1, Gpu::gp0_draw_mode),
                0xE2 => (1, Gpu::gp0_texture_window),
                0xE3 => (1, Gpu::gp0_drawing_area_top_left),
                0xE4 => (1, Gpu::gp0_drawing_area_bottom_right),
                0xE5 => (1, Gpu::gp0_drawing_offset),
                0xE6 => (1, Gpu::gp0_mask_bit_setting),
                _ => {
                    log::warn!("Unhandled GP0 command 0x{:08X}", val);
                    (1, Gpu::gp0_nop)
                }
            };

            self.gp0_words_remaining = len;
            self.gp0_handler = handler;

            self.gp0_command.clear();
        }

        self.gp0_words_remaining -= 1;

        match self.gp0_mode {
            Gp0Mode::Command => {
                self.gp0_command.push_word(val);

                if self.gp0_words_remaining == 0 {
                    // We have all the parameters, run the command
                    (self.gp0_handler)(self);
                }
            }
            Gp0Mode::ImageLoad => {
                self.image_buffer.push_word(val);

                if self.gp0_words_remaining == 0 {
                    log::trace!(
                        "GPU: image load complete at {:?} ({}x{})",
                        self.image_buffer.top_left,
                        self.image_buffer.resolution.0,
                        self.image_buffer.resolution.1
                    );

                    self.gp0_mode = Gp0Mode::Command;
                }
            }
        }
    }

    /// GP0(0x00): No Operation
    fn gp0_nop(&mut self) {}

    /// GP0(0x01): Clear Cache
    fn gp0_clear_cache(&mut self) {
        // The texture cache is not emulated
    }

    /// GP0(0x02): Fill Rectangle
    fn gp0_fill_rect(&mut self) {
        let color = self.gp0_command[0];
        let top_left = self.gp0_command[1];
        let size = self.gp0_command[2];

        let x = (top_left & 0x3FF) as i16;
        let y = ((top_left >> 16) & 0x1FF) as i16;
        let w = (size & 0x3FF) as i16;
        let h = ((size >> 16) & 0x1FF) as i16;

        let corner = |dx: i16, dy: i16| {
            let pos = ((x + dx) as u16 as u32) | (((y + dy) as u16 as u32) << 16);
            Vertex::from_words(pos, color)
        };

        self.push_quad([
            corner(0, 0),
            corner(w, 0),
            corner(0, h),
            corner(w, h),
        ]);
    }

    /// GP0(0x28): Monochrome Opaque Quadrilateral
    fn gp0_quad_mono_opaque(&mut self) {
        let color = self.gp0_command[0];

        let vertices = [
            Vertex::from_words(self.gp0_command[1], color),
            Vertex::from_words(self.gp0_command[2], color),
            Vertex::from_words(self.gp0_command[3], color),
            Vertex::from_words(self.gp0_command[4], color),
        ];

        self.push_quad(vertices);
    }

    /// GP0(0x2C): Textured Opaque Quadrilateral with color blending
    fn gp0_quad_texture_blend_opaque(&mut self) {
        // Texture sampling is out of the core's scope; the quad is drawn
        // with its blend color.
        let color = self.gp0_command[0];

        let vertices = [
            Vertex::from_words(self.gp0_command[1], color),
            Vertex::from_words(self.gp0_command[3], color),
            Vertex::from_words(self.gp0_command[5], color),
            Vertex::from_words(self.gp0_command[7], color),
        ];

        self.push_quad(vertices);
    }

    /// GP0(0x30): Shaded Opaque Triangle
    fn gp0_triangle_shaded_opaque(&mut self) {
        let vertices = [
            Vertex::from_words(self.gp0_command[1], self.gp0_command[0]),
            Vertex::from_words(self.gp0_command[3], self.gp0_command[2]),
            Vertex::from_words(self.gp0_command[5], self.gp0_command[4]),
        ];

        self.renderer.push_triangle(vertices);
    }

    /// GP0(0x38): Shaded Opaque Quadrilateral
    fn gp0_quad_shaded_opaque(&mut self) {
        let vertices = [
            Vertex::from_words(self.gp0_command[1], self.gp0_command[0]),
            Vertex::from_words(self.gp0_command[3], self.gp0_command[2]),
            Vertex::from_words(self.gp0_command[5], self.gp0_command[4]),
            Vertex::from_words(self.gp0_command[7], self.gp0_command[6]),
        ];

        self.push_quad(vertices);
    }

    /// GP0(0xA0): Image Load
    fn gp0_image_load(&mut self) {
        let pos = self.gp0_command[1];
        let res = self.gp0_command[2];

        let x = (pos & 0x3FF) as u16;
        let y = ((pos >> 16) & 0x1FF) as u16;
        let width = (res & 0xFFFF) as u16;
        let height = (res >> 16) as u16;

        // Size of the image in 16bit pixels, round up since we transfer
        // 32 bits at a time (one padding halfword for odd sizes)
        let imgsize = (width as u32 * height as u32 + 1) & !1;
        let words = imgsize / 2;

        self.image_buffer.reset(x, y, width, height);

        if words > 0 {
            self.gp0_words_remaining = words;
            self.gp0_mode = Gp0Mode::ImageLoad;
        } else {
            log::warn!("GPU: 0-sized image load at ({}, {})", x, y);
        }
    }

    /// GP0(0xC0): Image Store
    fn gp0_image_store(&mut self) {
        let res = self.gp0_command[2];

        let width = res & 0xFFFF;
        let height = res >> 16;

        // There is no VRAM in the core so there's nothing to send back;
        // GPUREAD will return the latched read_word for every read.
        log::warn!("GPU: unhandled image store ({}x{})", width, height);
    }

    /// GP0(0xE1): Draw Mode Setting
    fn gp0_draw_mode(&mut self) {
        let val = self.gp0_command[0];

        self.page_base_x = (val & 0xF) as u8;
        self.page_base_y = ((val >> 4) & 1) as u8;
        self.semi_transparency = ((val >> 5) & 3) as u8;

        self.texture_depth = match (val >> 7) & 3 {
            0 => TextureDepth::T4Bit,
            1 => TextureDepth::T8Bit,
            2 => TextureDepth::T15Bit,
            n => {
                log::warn!("Unhandled texture depth {}, using 15 bit", n);
                TextureDepth::T15Bit
            }
        };

        self.dithering = ((val >> 9) & 1) != 0;
        self.draw_to_display = ((val >> 10) & 1) != 0;
        self.texture_disable = ((val >> 11) & 1) != 0;
        self.rectangle_texture_x_flip = ((val >> 12) & 1) != 0;
        self.rectangle_texture_y_flip = ((val >> 13) & 1) != 0;

        if self.rectangle_texture_x_flip || self.rectangle_texture_y_flip {
            // Only matters for textured rectangles, which are not part of
            // the drawing command subset
            log::trace!("GPU: rectangle texture flip requested");
        }
    }

    /// GP0(0xE2): Set Texture Window
    fn gp0_texture_window(&mut self) {
        let val = self.gp0_command[0];

        self.texture_window_x_mask = (val & 0x1F) as u8;
        self.texture_window_y_mask = ((val >> 5) & 0x1F) as u8;
        self.texture_window_x_offset = ((val >> 10) & 0x1F) as u8;
        self.texture_window_y_offset = ((val >> 15) & 0x1F) as u8;
    }

    /// GP0(0xE3): Set Drawing Area top left corner
    fn gp0_drawing_area_top_left(&mut self) {
        let val = self.gp0_command[0];

        self.drawing_area_top = ((val >> 10) & 0x3FF) as u16;
        self.drawing_area_left = (val & 0x3FF) as u16;
    }

    /// GP0(0xE4): Set Drawing Area bottom right corner
    fn gp0_drawing_area_bottom_right(&mut self) {
        let val = self.gp0_command[0];

        self.drawing_area_bottom = ((val >> 10) & 0x3FF) as u16;
        self.drawing_area_right = (val & 0x3FF) as u16;
    }

    /// GP0(0xE5): Set Drawing Offset
    fn gp0_drawing_offset(&mut self) {
        let val = self.gp0_command[0];

        let x = (val & 0x7FF) as u16;
        let y = ((val >> 11) & 0x7FF) as u16;

        // Values are 11 bit two's complement, shift them to the far left
        // to force sign extension
        self.drawing_offset = (((x << 5) as i16) >> 5, ((y << 5) as i16) >> 5);
    }

    /// GP0(0xE6): Set Mask Bit Setting
    fn gp0_mask_bit_setting(&mut self) {
        let val = self.gp0_command[0];

        self.force_set_mask_bit = (val & 1) != 0;
        self.preserve_masked_pixels = (val & 2) != 0;
    }

    /// Decompose a quad into two triangles (0-1-2 and 1-2-3) for the
    /// renderer
    fn push_quad(&mut self, vertices: [Vertex; 4]) {
        self.renderer
            .push_triangle([vertices[0], vertices[1], vertices[2]]);
        self.renderer
            .push_triangle([vertices[1], vertices[2], vertices[3]]);
    }

    // ========== GP1: control commands ==========

    /// Handle writes to the GP1 command register
    pub fn gp1(&mut self, val: u32, th: &mut TimeHandler, irq: &mut InterruptController) {
        let opcode = (val >> 24) & 0xFF;

        match opcode {
            0x00 => self.gp1_reset(th),
            0x01 => self.gp1_reset_command_buffer(),
            0x02 => self.gp1_acknowledge_irq(),
            0x03 => self.gp1_display_enable(val),
            0x04 => self.gp1_dma_direction(val),
            0x05 => self.gp1_display_vram_start(val),
            0x06 => self.gp1_display_horizontal_range(val),
            0x07 => self.gp1_display_vertical_range(val, th, irq),
            0x08 => self.gp1_display_mode(val, th, irq),
            0x10 => self.gp1_get_info(val),
            _ => log::warn!("Unhandled GP1 command 0x{:08X}", val),
        }
    }

    /// GP1(0x00): Soft reset
    fn gp1_reset(&mut self, th: &mut TimeHandler) {
        self.gp0_interrupt = false;

        self.page_base_x = 0;
        self.page_base_y = 0;
        self.semi_transparency = 0;
        self.texture_depth = TextureDepth::T4Bit;
        self.texture_window_x_mask = 0;
        self.texture_window_y_mask = 0;
        self.texture_window_x_offset = 0;
        self.texture_window_y_offset = 0;
        self.dithering = false;
        self.draw_to_display = false;
        self.texture_disable = false;
        self.rectangle_texture_x_flip = false;
        self.rectangle_texture_y_flip = false;
        self.drawing_area_left = 0;
        self.drawing_area_top = 0;
        self.drawing_area_right = 0;
        self.drawing_area_bottom = 0;
        self.drawing_offset = (0, 0);
        self.force_set_mask_bit = false;
        self.preserve_masked_pixels = false;

        self.dma_direction = DmaDirection::Off;

        self.display_disabled = true;
        self.display_vram_x_start = 0;
        self.display_vram_y_start = 0;
        self.hres = HorizontalRes::from_fields(0, 0);
        self.vres = VerticalRes::Y240Lines;

        self.display_horiz_start = 0x200;
        self.display_horiz_end = 0xc00;
        self.display_line_start = 0x10;
        self.display_line_end = 0x100;
        self.display_depth = DisplayDepth::D15Bits;
        self.interlaced = false;
        self.field = Field::Top;

        self.gp1_reset_command_buffer();

        // Timings changed, reschedule the next wake up
        self.predict_next_sync(th);
    }

    /// GP1(0x01): Reset Command Buffer
    fn gp1_reset_command_buffer(&mut self) {
        self.gp0_command.clear();
        self.gp0_words_remaining = 0;
        self.gp0_mode = Gp0Mode::Command;
    }

    /// GP1(0x02): Acknowledge Interrupt
    fn gp1_acknowledge_irq(&mut self) {
        self.gp0_interrupt = false;
    }

    /// GP1(0x03): Display Enable
    fn gp1_display_enable(&mut self, val: u32) {
        self.display_disabled = val & 1 != 0;
    }

    /// GP1(0x04): DMA Direction
    fn gp1_dma_direction(&mut self, val: u32) {
        self.dma_direction = match val & 3 {
            0 => DmaDirection::Off,
            1 => DmaDirection::Fifo,
            2 => DmaDirection::CpuToGp0,
            3 => DmaDirection::VRamToCpu,
            _ => unreachable!(),
        };
    }

    /// GP1(0x05): Display VRAM Start
    fn gp1_display_vram_start(&mut self, val: u32) {
        self.display_vram_x_start = (val & 0x3FE) as u16;
        self.display_vram_y_start = ((val >> 10) & 0x1FF) as u16;
    }

    /// GP1(0x06): Display Horizontal Range
    fn gp1_display_horizontal_range(&mut self, val: u32) {
        self.display_horiz_start = (val & 0xFFF) as u16;
        self.display_horiz_end = ((val >> 12) & 0xFFF) as u16;
    }

    /// GP1(0x07): Display Vertical Range
    fn gp1_display_vertical_range(
        &mut self,
        val: u32,
        th: &mut TimeHandler,
        irq: &mut InterruptController,
    ) {
        self.display_line_start = (val & 0x3FF) as u16;
        self.display_line_end = ((val >> 10) & 0x3FF) as u16;

        // The blanking window moved, resync to reconsider the next VBLANK
        // edge
        self.sync(th, irq);
    }

    /// GP1(0x08): Display Mode
    fn gp1_display_mode(&mut self, val: u32, th: &mut TimeHandler, irq: &mut InterruptController) {
        let hr1 = (val & 3) as u8;
        let hr2 = ((val >> 6) & 1) as u8;

        self.hres = HorizontalRes::from_fields(hr1, hr2);

        self.vres = if val & 0x4 != 0 {
            VerticalRes::Y480Lines
        } else {
            VerticalRes::Y240Lines
        };

        self.hardware = if val & 0x8 != 0 {
            HardwareType::Pal
        } else {
            HardwareType::Ntsc
        };

        self.display_depth = if val & 0x10 != 0 {
            DisplayDepth::D24Bits
        } else {
            DisplayDepth::D15Bits
        };

        self.interlaced = val & 0x20 != 0;
        // The field resets on mode change
        self.field = Field::Top;

        if val & 0x80 != 0 {
            log::warn!("Unsupported display mode 0x{:08X} (reverse flag)", val);
        }

        // Clock geometry changed, reschedule
        self.sync(th, irq);
    }

    /// GP1(0x10): Get GPU Info
    fn gp1_get_info(&mut self, val: u32) {
        match val & 0xF {
            // Texture window
            0x2 => {
                self.read_word = (self.texture_window_x_mask as u32)
                    | ((self.texture_window_y_mask as u32) << 5)
                    | ((self.texture_window_x_offset as u32) << 10)
                    | ((self.texture_window_y_offset as u32) << 15);
            }
            // Drawing area top left
            0x3 => {
                self.read_word =
                    (self.drawing_area_left as u32) | ((self.drawing_area_top as u32) << 10);
            }
            // Drawing area bottom right
            0x4 => {
                self.read_word =
                    (self.drawing_area_right as u32) | ((self.drawing_area_bottom as u32) << 10);
            }
            // Drawing offset
            0x5 => {
                let (x, y) = self.drawing_offset;

                self.read_word = ((x as u32) & 0x7FF) | (((y as u32) & 0x7FF) << 11);
            }
            // GPU version
            0x7 => self.read_word = 2,
            n => log::warn!("Unhandled GP1 info request {}", n),
        }
    }
}
