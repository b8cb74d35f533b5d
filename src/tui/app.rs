//! Debugger application state and logic.

use crate::{Address, Cpu, Image};
use crate::asm::disasm::disassemble_word;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Loaded image, reloaded on reset.
    pub image: Image,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<Address>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view offset from the program start.
    pub mem_scroll: i16,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(image: Image) -> Self {
        let cpu = Cpu::from_image(&image);

        Self {
            cpu,
            image,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU halted: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc;
        match self.cpu.step() {
            Ok(instr) => {
                self.status = format!("PC={}: {}", crate::word::hex(pc), instr);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
        // Step off a breakpoint we are already sitting on.
        self.step();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Halted after {} cycles", self.cpu.cycles);
            return;
        }

        // Check for breakpoint
        let pc = self.cpu.regs.pc;
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", crate::word::hex(pc));
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", crate::word::hex(pc));
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", crate::word::hex(pc));
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.cpu.load_image(&self.image);
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Scroll the memory view by `rows`, wrapping around the address space.
    pub fn scroll_memory(&mut self, rows: i16) {
        self.mem_scroll = self.mem_scroll.wrapping_add(rows);
    }

    /// Move the memory view to the next written cell past its first row.
    pub fn next_written_cell(&mut self) {
        let view = self.memory_view_start() as u16;
        let cells = self.cpu.mem.written_cells();
        let next = cells
            .iter()
            .find(|&&(addr, _)| addr as u16 > view)
            .or_else(|| cells.first());

        match next {
            Some(&(addr, _)) => {
                self.mem_scroll = addr.wrapping_sub(self.image.start);
                self.status = format!("Memory at {}", crate::word::hex(addr));
            }
            None => self.status = "No written memory.".into(),
        }
    }

    /// First address shown in the memory view.
    pub fn memory_view_start(&self) -> Address {
        self.image.start.wrapping_add(self.mem_scroll)
    }

    /// Get disassembly around current PC: (address, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(Address, String, bool)> {
        let pc = self.cpu.regs.pc;
        let start = pc.wrapping_sub((lines / 2) as i16);

        self.cpu.mem
            .dump(start, lines)
            .into_iter()
            .map(|(addr, word)| (addr, disassemble_word(word), addr == pc))
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(image: Image) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create app
    let mut app = DebuggerApp::new(image);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-16),
                        KeyCode::PageDown => app.scroll_memory(16),
                        KeyCode::Char('w') => app.next_written_cell(),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
